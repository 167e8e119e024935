//! Generic invite engine, written once and instantiated per invite variant.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use meshgate_storage::{
    Invite, InviteEntity, InvitePage, InviteState, InviteStore, PageParams, StoreError, TypedId,
    UserId, UserRole,
};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::expiry::{expire_stale, ExpiryScope};
use crate::rows::{select_columns, InviteRow};
use crate::{is_foreign_key_violation, is_unique_violation};

/// [`InviteStore`] over the table described by `E`'s [`InviteEntity`] contract.
///
/// Raw row access is private to this crate; the public surface only exposes operations that
/// run the appropriate expiry pass first.
pub struct SqliteInviteStore<E> {
    pool: SqlitePool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for SqliteInviteStore<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: InviteEntity> SqliteInviteStore<E> {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    /// Connection for a read path. Reads start with an expiry pass, so failing to get one is
    /// reported the way a failed pass is.
    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Sqlite>, StoreError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| StoreError::UpdateFailed(format!("expiry sync: {}", e)))
    }
}

/// Listing predicate: a column compared against one key.
struct ListFilter {
    column: &'static str,
    key: String,
}

async fn insert<E: InviteEntity>(
    conn: &mut SqliteConnection,
    invite: &Invite,
) -> Result<(), StoreError> {
    let sql = format!(
        "INSERT INTO {}(id, {}, invitee_id, invitee_email, inviter_id, invitee_role, state, created_at, expires_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        E::TABLE,
        E::DESTINATION_COLUMN
    );

    sqlx::query(&sql)
        .bind(invite.id.to_string())
        .bind(invite.destination_id.to_string())
        .bind(invite.invitee_id.map(|u| u.to_string()))
        .bind(&invite.invitee_email)
        .bind(invite.inviter_id.to_string())
        .bind(&invite.invitee_role)
        .bind(invite.state.as_str())
        .bind(invite.created_at)
        .bind(invite.expires_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict
            } else if is_foreign_key_violation(&e) {
                StoreError::MalformedInput(e.to_string())
            } else {
                StoreError::CreateFailed(e.to_string())
            }
        })?;

    Ok(())
}

/// Fetch an invite regardless of state, dormant included.
pub(crate) async fn fetch_invite<E: InviteEntity>(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<E>, StoreError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?",
        select_columns::<E>(),
        E::TABLE
    );

    let row = sqlx::query_as::<_, InviteRow>(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| StoreError::ViewFailed(e.to_string()))?;

    row.map(InviteRow::into_entity::<E>).transpose()
}

async fn fetch_page<E: InviteEntity>(
    conn: &mut SqliteConnection,
    filter: ListFilter,
    page: &PageParams,
) -> Result<InvitePage<E>, StoreError> {
    let mut predicate = format!("{} = ? AND state != 'dormant'", filter.column);
    if page.state.is_some() {
        predicate.push_str(" AND state = ?");
    }

    let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {}", E::TABLE, predicate);
    let mut count = sqlx::query_scalar::<_, i64>(&count_sql).bind(&filter.key);
    if let Some(state) = page.state {
        count = count.bind(state.as_str());
    }
    let total = count
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| StoreError::ViewFailed(e.to_string()))?;

    let list_sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {} {dir}, id {dir} LIMIT ? OFFSET ?",
        select_columns::<E>(),
        E::TABLE,
        predicate,
        page.order.column(),
        dir = page.direction.as_sql()
    );
    let mut list = sqlx::query_as::<_, InviteRow>(&list_sql).bind(&filter.key);
    if let Some(state) = page.state {
        list = list.bind(state.as_str());
    }
    let rows = list
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| StoreError::ViewFailed(e.to_string()))?;

    let invites = rows
        .into_iter()
        .map(InviteRow::into_entity::<E>)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InvitePage {
        invites,
        total: total as u64,
        offset: page.offset,
        limit: page.limit,
    })
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[async_trait::async_trait]
impl<E: InviteEntity> InviteStore<E> for SqliteInviteStore<E> {
    async fn save_invites(&self, invites: &[E]) -> Result<(), StoreError> {
        if invites.is_empty() {
            return Ok(());
        }

        let now = now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::CreateFailed(e.to_string()))?;

        for entity in invites {
            // Round-trip through the contract so only resolvable rows (known role, usable
            // email) are written, with the email in canonical form.
            let invite = E::from_invite(entity.to_invite())?.to_invite();

            expire_stale::<E>(
                &mut *tx,
                ExpiryScope::Slot {
                    email: &invite.invitee_email,
                    invitee: invite.invitee_id,
                    destination: invite.destination_id,
                },
                now,
            )
            .await?;
            insert::<E>(&mut *tx, &invite).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::CreateFailed(e.to_string()))?;

        debug!(table = E::TABLE, count = invites.len(), "saved invites");
        Ok(())
    }

    async fn retrieve_invite_by_id(&self, id: &E::Id) -> Result<E, StoreError> {
        let mut conn = self.acquire().await?;
        expire_stale::<E>(&mut conn, ExpiryScope::Id(id.as_uuid()), now()).await?;

        match fetch_invite::<E>(&mut conn, id.as_uuid()).await? {
            Some(invite) if invite.state() != InviteState::Dormant => Ok(invite),
            _ => Err(StoreError::NotFound),
        }
    }

    async fn remove_invite(&self, id: &E::Id) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", E::TABLE);
        let result = sqlx::query(&sql)
            .bind(id.as_uuid().to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::RemoveFailed(e.to_string()))?;

        match result.rows_affected() {
            1 => Ok(()),
            0 => Err(StoreError::NotFound),
            n => Err(StoreError::RemoveFailed(format!("{} rows removed", n))),
        }
    }

    async fn update_invite_state(&self, id: &E::Id, state: InviteState) -> Result<(), StoreError> {
        let sql = format!("UPDATE {} SET state = ? WHERE id = ?", E::TABLE);
        let result = sqlx::query(&sql)
            .bind(state.as_str())
            .bind(id.as_uuid().to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict
                } else {
                    StoreError::UpdateFailed(e.to_string())
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn retrieve_invites_by_destination(
        &self,
        destination: &E::Destination,
        page: &PageParams,
    ) -> Result<InvitePage<E>, StoreError> {
        page.validate()?;

        let destination = destination.as_uuid();
        let mut conn = self.acquire().await?;
        expire_stale::<E>(&mut conn, ExpiryScope::Destination(destination), now()).await?;

        fetch_page::<E>(
            &mut conn,
            ListFilter {
                column: E::DESTINATION_COLUMN,
                key: destination.to_string(),
            },
            page,
        )
        .await
    }

    async fn retrieve_invites_by_user(
        &self,
        role: UserRole,
        user_id: &UserId,
        page: &PageParams,
    ) -> Result<InvitePage<E>, StoreError> {
        page.validate()?;

        // Expire across everything the user can see, not just this page, so consecutive
        // pages never disagree about an invite's state.
        let mut conn = self.acquire().await?;
        expire_stale::<E>(
            &mut conn,
            ExpiryScope::User {
                role,
                user: user_id.0,
            },
            now(),
        )
        .await?;

        let column = match role {
            UserRole::Inviter => "inviter_id",
            UserRole::Invitee => "invitee_id",
        };
        fetch_page::<E>(
            &mut conn,
            ListFilter {
                column,
                key: user_id.0.to_string(),
            },
            page,
        )
        .await
    }

    async fn resolve_invitee(&self, email: &str, user_id: &UserId) -> Result<u64, StoreError> {
        let email = meshgate_storage::normalize_email(email)
            .ok_or_else(|| StoreError::MalformedInput(format!("invalid email: {:?}", email)))?;

        let now = now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;

        expire_stale::<E>(
            &mut *tx,
            ExpiryScope::Addressee {
                email: &email,
                user: user_id.0,
            },
            now,
        )
        .await?;

        // A pending invite is left unbound while the user already holds another pending
        // invite into the same destination; it stays answerable through its email.
        let sql = format!(
            "UPDATE {table} SET invitee_id = ?
             WHERE invitee_email = ? AND invitee_id IS NULL
               AND NOT (state = 'pending' AND EXISTS (
                   SELECT 1 FROM {table} AS held
                   WHERE held.invitee_id = ? AND held.state = 'pending'
                     AND held.{column} = {table}.{column}))",
            table = E::TABLE,
            column = E::DESTINATION_COLUMN
        );
        let result = sqlx::query(&sql)
            .bind(user_id.0.to_string())
            .bind(&email)
            .bind(user_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict
                } else {
                    StoreError::UpdateFailed(e.to_string())
                }
            })?;

        tx.commit()
            .await
            .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;

        let bound = result.rows_affected();
        debug!(table = E::TABLE, user_id = %user_id, bound, "resolved invitee");
        Ok(bound)
    }
}
