use chrono::{DateTime, Utc};
use meshgate_storage::{Invite, InviteEntity, InviteState, StoreError};

use crate::parse_uuid;

/// Raw invite row, identical for every invite table once the destination column is aliased.
#[derive(sqlx::FromRow)]
pub(crate) struct InviteRow {
    id: String,
    destination_id: String,
    invitee_id: Option<String>,
    invitee_email: String,
    inviter_id: String,
    invitee_role: String,
    state: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl InviteRow {
    pub(crate) fn into_entity<E: InviteEntity>(self) -> Result<E, StoreError> {
        let state: InviteState = self
            .state
            .parse()
            .map_err(|e: meshgate_storage::ParseInviteStateError| {
                StoreError::MalformedInput(e.to_string())
            })?;

        E::from_invite(Invite {
            id: parse_uuid(&self.id)?,
            destination_id: parse_uuid(&self.destination_id)?,
            invitee_id: self.invitee_id.as_deref().map(parse_uuid).transpose()?,
            invitee_email: self.invitee_email,
            inviter_id: parse_uuid(&self.inviter_id)?,
            invitee_role: self.invitee_role,
            created_at: self.created_at,
            expires_at: self.expires_at,
            state,
        })
    }
}

/// Column list for `SELECT`s against `E::TABLE`, in `InviteRow` order.
pub(crate) fn select_columns<E: InviteEntity>() -> String {
    format!(
        "id, {} AS destination_id, invitee_id, invitee_email, inviter_id, invitee_role, state, created_at, expires_at",
        E::DESTINATION_COLUMN
    )
}
