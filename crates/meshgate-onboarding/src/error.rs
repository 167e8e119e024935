use meshgate_storage::{GroupId, InviteState, ParseRoleError, StoreError};
use thiserror::Error;

/// Errors surfaced by the onboarding workflow.
#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    InvalidRole(#[from] ParseRoleError),

    #[error("role {0} cannot be granted by invite")]
    RoleNotInvitable(String),

    #[error("invalid action: {0}. Expected 'accept' or 'decline'")]
    InvalidAction(String),

    #[error("invalid invitee email: {0}")]
    InvalidEmail(String),

    #[error("group {0} is listed more than once")]
    DuplicateGroup(GroupId),

    #[error("invite is {0}, not pending")]
    NotPending(InviteState),

    #[error("invite is addressed to someone else")]
    NotInvitee,
}
