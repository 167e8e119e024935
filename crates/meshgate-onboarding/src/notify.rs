//! Invite notification seam.
//!
//! Delivery (e-mail, push) lives outside this crate. The workflow reports every invite that
//! becomes actionable through [`InviteNotifier`]; failures are logged and never fail the
//! operation that issued the invite.

use async_trait::async_trait;
use meshgate_storage::{DestinationKind, Invite};
use thiserror::Error;
use tracing::info;

/// Notification error
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to deliver notification: {0}")]
    DeliveryFailed(String),
}

/// Receives invites that just became actionable for their invitee.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InviteNotifier: Send + Sync {
    async fn invite_issued(&self, kind: DestinationKind, invite: &Invite)
        -> Result<(), NotifyError>;
}

/// Notifier that only logs. Used when no delivery channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl InviteNotifier for TracingNotifier {
    async fn invite_issued(
        &self,
        kind: DestinationKind,
        invite: &Invite,
    ) -> Result<(), NotifyError> {
        info!(
            kind = kind.as_str(),
            invite_id = %invite.id,
            destination_id = %invite.destination_id,
            invitee_email = %invite.invitee_email,
            expires_at = %invite.expires_at,
            "invite issued"
        );
        Ok(())
    }
}
