//! Invite types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    GroupId, GroupInviteId, GroupRole, OrganizationId, OrganizationInviteId, OrganizationRole,
    UserId,
};

/// Lifecycle state of an invite.
///
/// `Dormant` invites are staged behind a parent invite and are invisible to every ordinary
/// read path until the parent is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteState {
    Dormant,
    Pending,
    Accepted,
    Declined,
    Expired,
}

/// Error type for parsing InviteState from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseInviteStateError(pub String);

impl std::fmt::Display for ParseInviteStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid invite state: {}", self.0)
    }
}

impl std::error::Error for ParseInviteStateError {}

impl FromStr for InviteState {
    type Err = ParseInviteStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dormant" => Ok(InviteState::Dormant),
            "pending" => Ok(InviteState::Pending),
            "accepted" => Ok(InviteState::Accepted),
            "declined" => Ok(InviteState::Declined),
            "expired" => Ok(InviteState::Expired),
            _ => Err(ParseInviteStateError(s.to_string())),
        }
    }
}

impl InviteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteState::Dormant => "dormant",
            InviteState::Pending => "pending",
            InviteState::Accepted => "accepted",
            InviteState::Declined => "declined",
            InviteState::Expired => "expired",
        }
    }

    /// Accepted, declined and expired invites never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InviteState::Accepted | InviteState::Declined | InviteState::Expired
        )
    }
}

impl std::fmt::Display for InviteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which containment scope an invite grants access to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    Organization,
    Group,
}

/// Error type for parsing DestinationKind from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDestinationKindError(pub String);

impl std::fmt::Display for ParseDestinationKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid destination kind: {}", self.0)
    }
}

impl std::error::Error for ParseDestinationKindError {}

impl FromStr for DestinationKind {
    type Err = ParseDestinationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "organization" | "org" => Ok(DestinationKind::Organization),
            "group" => Ok(DestinationKind::Group),
            _ => Err(ParseDestinationKindError(s.to_string())),
        }
    }
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Organization => "organization",
            DestinationKind::Group => "group",
        }
    }
}

/// Variant-neutral invite shape.
///
/// This is what backends persist and what the transport layer serializes; the typed
/// variants convert to and from it through [`crate::InviteEntity`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    pub destination_id: Uuid,
    pub invitee_id: Option<Uuid>,
    pub invitee_email: String,
    pub inviter_id: Uuid,
    pub invitee_role: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: InviteState,
}

/// Invite into an organization
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrganizationInvite {
    pub id: OrganizationInviteId,
    pub organization_id: OrganizationId,
    pub invitee_id: Option<UserId>, // None until the invitee is resolved by email
    pub invitee_email: String,
    pub inviter_id: UserId,
    pub role: OrganizationRole,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: InviteState,
}

/// Invite into a group
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupInvite {
    pub id: GroupInviteId,
    pub group_id: GroupId,
    pub invitee_id: Option<UserId>, // None until the invitee is resolved by email
    pub invitee_email: String,
    pub inviter_id: UserId,
    pub role: GroupRole,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: InviteState,
}

/// Canonical form of an invitee email: trimmed and lower-cased.
///
/// Returns `None` unless the address has a non-empty local part and domain.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_state_roundtrip() {
        for state in [
            InviteState::Dormant,
            InviteState::Pending,
            InviteState::Accepted,
            InviteState::Declined,
            InviteState::Expired,
        ] {
            assert_eq!(state.as_str().parse::<InviteState>().unwrap(), state);
        }
        assert!("revoked".parse::<InviteState>().is_err());
    }

    #[test]
    fn test_invite_state_terminal() {
        assert!(!InviteState::Dormant.is_terminal());
        assert!(!InviteState::Pending.is_terminal());
        assert!(InviteState::Accepted.is_terminal());
        assert!(InviteState::Declined.is_terminal());
        assert!(InviteState::Expired.is_terminal());
    }

    #[test]
    fn test_destination_kind_parse() {
        assert_eq!(
            "org".parse::<DestinationKind>().unwrap(),
            DestinationKind::Organization
        );
        assert_eq!(
            "group".parse::<DestinationKind>().unwrap(),
            DestinationKind::Group
        );
        assert_eq!(
            "thing".parse::<DestinationKind>().unwrap_err(),
            ParseDestinationKindError("thing".to_string())
        );
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Alice@Example.COM "),
            Some("alice@example.com".to_string())
        );
        assert_eq!(normalize_email("alice"), None);
        assert_eq!(normalize_email("@example.com"), None);
        assert_eq!(normalize_email("alice@"), None);
        assert_eq!(normalize_email("a@b@c"), None);
    }

    #[test]
    fn test_invite_wire_shape() {
        let invite = Invite {
            id: Uuid::new_v4(),
            destination_id: Uuid::new_v4(),
            invitee_id: None,
            invitee_email: "a@example.com".to_string(),
            inviter_id: Uuid::new_v4(),
            invitee_role: "viewer".to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
            state: InviteState::Pending,
        };

        let json = serde_json::to_value(&invite).unwrap();
        assert_eq!(json["state"], "pending");
        assert_eq!(json["invitee_role"], "viewer");
        assert!(json["invitee_id"].is_null());
    }
}
