//! Lazy expiry: pending invites past their `expires_at` are flipped to `expired` on access.
//!
//! There is no background sweep. Every store entry point that reads or claims invites runs
//! the narrowest scope that covers the rows it is about to look at.

use chrono::{DateTime, Utc};
use meshgate_storage::{InviteEntity, StoreError, UserRole};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

/// Which pending invites an expiry pass looks at.
#[derive(Clone, Copy, Debug)]
pub(crate) enum ExpiryScope<'a> {
    /// A single invite.
    Id(Uuid),
    /// The uniqueness slot an insert is about to occupy: the destination plus the invited
    /// email or, when known, the bound invitee.
    Slot {
        email: &'a str,
        invitee: Option<Uuid>,
        destination: Uuid,
    },
    /// Every invite addressed to an email or already bound to its user.
    Addressee { email: &'a str, user: Uuid },
    /// Every invite into a destination.
    Destination(Uuid),
    /// Every invite a user sent or received.
    User { role: UserRole, user: Uuid },
}

/// Expire stale pending invites in `scope`. Returns the number of invites expired.
///
/// Idempotent: a second call at the same instant changes nothing. Failures surface as
/// `UpdateFailed` and must abort the caller's operation.
pub(crate) async fn expire_stale<E: InviteEntity>(
    conn: &mut SqliteConnection,
    scope: ExpiryScope<'_>,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    // `invitee_id = NULL` never matches, so an unbound candidate only checks its email.
    let (filter, keys): (String, Vec<Option<String>>) = match scope {
        ExpiryScope::Id(id) => ("id = ?".to_string(), vec![Some(id.to_string())]),
        ExpiryScope::Slot {
            email,
            invitee,
            destination,
        } => (
            format!(
                "{} = ? AND (invitee_email = ? OR invitee_id = ?)",
                E::DESTINATION_COLUMN
            ),
            vec![
                Some(destination.to_string()),
                Some(email.to_string()),
                invitee.map(|u| u.to_string()),
            ],
        ),
        ExpiryScope::Addressee { email, user } => (
            "(invitee_email = ? OR invitee_id = ?)".to_string(),
            vec![Some(email.to_string()), Some(user.to_string())],
        ),
        ExpiryScope::Destination(destination) => (
            format!("{} = ?", E::DESTINATION_COLUMN),
            vec![Some(destination.to_string())],
        ),
        ExpiryScope::User { role, user } => {
            let column = match role {
                UserRole::Inviter => "inviter_id",
                UserRole::Invitee => "invitee_id",
            };
            (format!("{} = ?", column), vec![Some(user.to_string())])
        }
    };

    let sql = format!(
        "UPDATE {} SET state = 'expired' WHERE state = 'pending' AND expires_at < ? AND {}",
        E::TABLE,
        filter
    );
    let mut query = sqlx::query(&sql).bind(now);
    for key in keys {
        query = query.bind(key);
    }

    let result = query
        .execute(&mut *conn)
        .await
        .map_err(|e| StoreError::UpdateFailed(format!("expiry sync: {}", e)))?;

    let expired = result.rows_affected();
    if expired > 0 {
        debug!(table = E::TABLE, ?scope, expired, "expired stale invites");
    }
    Ok(expired)
}
