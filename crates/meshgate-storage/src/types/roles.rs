//! Role types for organization and group membership.

use std::str::FromStr;

/// Error type for parsing a role from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError(pub String);

impl std::fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid role: {}", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

/// Role within an organization
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrganizationRole {
    Owner,  // Full control, can delete org; never granted by invite
    Admin,  // Manage members and groups
    Editor, // Manage things inside the org
    Viewer, // Read-only
}

impl FromStr for OrganizationRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(OrganizationRole::Owner),
            "admin" => Ok(OrganizationRole::Admin),
            "editor" => Ok(OrganizationRole::Editor),
            "viewer" => Ok(OrganizationRole::Viewer),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

impl OrganizationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationRole::Owner => "owner",
            OrganizationRole::Admin => "admin",
            OrganizationRole::Editor => "editor",
            OrganizationRole::Viewer => "viewer",
        }
    }

    /// Whether this role may be offered through an invite.
    pub fn is_invitable(&self) -> bool {
        !matches!(self, OrganizationRole::Owner)
    }
}

/// Role within a group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupRole {
    Admin,
    Editor,
    Viewer,
}

impl FromStr for GroupRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(GroupRole::Admin),
            "editor" => Ok(GroupRole::Editor),
            "viewer" => Ok(GroupRole::Viewer),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Admin => "admin",
            GroupRole::Editor => "editor",
            GroupRole::Viewer => "viewer",
        }
    }
}
