//! Inputs and outputs of the workflow operations.

use std::str::FromStr;

use meshgate_storage::{
    GroupId, GroupInvite, GroupRole, OrganizationId, OrganizationInvite, OrganizationRole, UserId,
};

use crate::OnboardingError;

/// A group invite bundled into an organization invite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupGrant {
    pub group_id: GroupId,
    pub role: GroupRole,
}

/// Invite someone into an organization, optionally pre-staging group invites that go live
/// once the organization invite is accepted.
#[derive(Clone, Debug)]
pub struct CreateOrganizationInvite {
    pub organization_id: OrganizationId,
    pub invitee_email: String,
    /// Set when the invitee is already a registered user
    pub invitee_id: Option<UserId>,
    pub role: OrganizationRole,
    pub groups: Vec<GroupGrant>,
}

#[derive(Clone, Debug)]
pub struct CreateGroupInvite {
    pub group_id: GroupId,
    pub invitee_email: String,
    pub invitee_id: Option<UserId>,
    pub role: GroupRole,
}

/// The authenticated user answering an invite.
#[derive(Clone, Debug)]
pub struct Responder {
    pub user_id: UserId,
    pub email: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseAction {
    Accept,
    Decline,
}

impl FromStr for ResponseAction {
    type Err = OnboardingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accept" => Ok(ResponseAction::Accept),
            "decline" => Ok(ResponseAction::Decline),
            _ => Err(OnboardingError::InvalidAction(s.to_string())),
        }
    }
}

/// Result of responding to an organization invite.
#[derive(Clone, Debug)]
pub struct OrganizationResponse {
    pub invite: OrganizationInvite,
    /// Bundled group invites that went live with this acceptance
    pub activated: Vec<GroupInvite>,
}
