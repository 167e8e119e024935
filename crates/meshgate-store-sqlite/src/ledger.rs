//! Dormant relation ledger: parent organization invite -> staged group invites.

use chrono::{DateTime, Utc};
use meshgate_storage::{
    DormantInviteLedger, GroupInvite, GroupInviteId, InviteEntity, InviteState,
    OrganizationInvite, OrganizationInviteId, StoreError, TypedId, UserId,
};
use sqlx::SqliteConnection;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::expiry::{expire_stale, ExpiryScope};
use crate::invites::fetch_invite;
use crate::{is_foreign_key_violation, is_unique_violation, parse_uuid, SqliteStore};

/// Outcome of trying to promote one dormant child.
enum Activation {
    Activated(GroupInvite),
    Superseded,
}

async fn activate_child(
    conn: &mut SqliteConnection,
    parent: Uuid,
    mut child: GroupInvite,
    invitee: &UserId,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Activation, StoreError> {
    let group = child.group_id.as_uuid();
    expire_stale::<GroupInvite>(
        &mut *conn,
        ExpiryScope::Slot {
            email: &child.invitee_email,
            invitee: Some(invitee.as_uuid()),
            destination: group,
        },
        now,
    )
    .await?;

    let live: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM group_invites
         WHERE group_id = ? AND state = 'pending' AND (invitee_email = ? OR invitee_id = ?)",
    )
    .bind(group.to_string())
    .bind(&child.invitee_email)
    .bind(invitee.to_string())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;

    if live > 0 {
        // The invitee already holds a live invite to this group; the staged one is dropped
        // along with its ledger link.
        sqlx::query("DELETE FROM group_invites WHERE id = ? AND state = 'dormant'")
            .bind(child.id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;
        warn!(
            parent_invite_id = %parent,
            invite_id = %child.id,
            group_id = %group,
            "dormant group invite superseded by a live invite"
        );
        return Ok(Activation::Superseded);
    }

    sqlx::query(
        "UPDATE group_invites SET state = 'pending', invitee_id = ?, expires_at = ?
         WHERE id = ? AND state = 'dormant'",
    )
    .bind(invitee.to_string())
    .bind(expires_at)
    .bind(child.id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;

    sqlx::query(
        "UPDATE dormant_invite_relations SET activated_at = ?
         WHERE parent_invite_id = ? AND child_invite_id = ?",
    )
    .bind(now)
    .bind(parent.to_string())
    .bind(child.id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;

    child.invitee_id = Some(invitee.clone());
    child.expires_at = expires_at;
    child.state = InviteState::Pending;
    Ok(Activation::Activated(child))
}

/// Promote every unactivated dormant child of `parent`, in link creation order.
async fn activate_children(
    conn: &mut SqliteConnection,
    parent: &OrganizationInviteId,
    invitee: &UserId,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<GroupInvite>, StoreError> {
    let child_ids: Vec<String> = sqlx::query_scalar(
        "SELECT r.child_invite_id FROM dormant_invite_relations r
         JOIN group_invites g ON g.id = r.child_invite_id
         WHERE r.parent_invite_id = ? AND r.activated_at IS NULL AND g.state = 'dormant'
         ORDER BY g.created_at, g.id",
    )
    .bind(parent.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;

    let mut activated = Vec::with_capacity(child_ids.len());
    for child_id in child_ids {
        let Some(child) = fetch_invite::<GroupInvite>(&mut *conn, parse_uuid(&child_id)?).await?
        else {
            continue;
        };
        match activate_child(&mut *conn, parent.as_uuid(), child, invitee, expires_at, now).await? {
            Activation::Activated(invite) => activated.push(invite),
            Activation::Superseded => {}
        }
    }

    debug!(
        parent_invite_id = %parent,
        table = GroupInvite::TABLE,
        activated = activated.len(),
        "activated dormant group invites"
    );
    Ok(activated)
}

#[async_trait::async_trait]
impl DormantInviteLedger for SqliteStore {
    async fn save_dormant_invite_relations(
        &self,
        parent: &OrganizationInviteId,
        children: &[GroupInviteId],
    ) -> Result<(), StoreError> {
        if children.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::CreateFailed(e.to_string()))?;

        for child in children {
            sqlx::query(
                "INSERT INTO dormant_invite_relations(parent_invite_id, child_invite_id, created_at)
                 VALUES(?, ?, ?)",
            )
            .bind(parent.to_string())
            .bind(child.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::MalformedInput(format!("unknown invite in link: {}", e))
                } else if is_unique_violation(&e) {
                    StoreError::Conflict
                } else {
                    StoreError::CreateFailed(e.to_string())
                }
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::CreateFailed(e.to_string()))?;

        debug!(
            parent_invite_id = %parent,
            children = children.len(),
            "saved dormant invite relations"
        );
        Ok(())
    }

    async fn activate_group_invites(
        &self,
        parent: &OrganizationInviteId,
        invitee: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<GroupInvite>, StoreError> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;

        let activated = activate_children(&mut *tx, parent, invitee, expires_at, now).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;
        Ok(activated)
    }

    async fn accept_and_activate(
        &self,
        parent: &OrganizationInviteId,
        invitee: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<GroupInvite>, StoreError> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;

        expire_stale::<OrganizationInvite>(&mut *tx, ExpiryScope::Id(parent.as_uuid()), now)
            .await?;

        let accepted = sqlx::query(
            "UPDATE organization_invites
             SET state = 'accepted', invitee_id = COALESCE(invitee_id, ?)
             WHERE id = ? AND state = 'pending'",
        )
        .bind(invitee.to_string())
        .bind(parent.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;

        if accepted.rows_affected() == 0 {
            // Dropping the transaction rolls back the expiry pass as well, which the next
            // read repeats anyway.
            return match fetch_invite::<OrganizationInvite>(&mut *tx, parent.as_uuid()).await? {
                Some(_) => Err(StoreError::Conflict),
                None => Err(StoreError::NotFound),
            };
        }

        let activated = activate_children(&mut *tx, parent, invitee, expires_at, now).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::UpdateFailed(e.to_string()))?;

        debug!(parent_invite_id = %parent, user_id = %invitee, "accepted organization invite");
        Ok(activated)
    }

    async fn discard_dormant_invites(
        &self,
        parent: &OrganizationInviteId,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM group_invites WHERE state = 'dormant' AND id IN
             (SELECT child_invite_id FROM dormant_invite_relations WHERE parent_invite_id = ?)",
        )
        .bind(parent.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::RemoveFailed(e.to_string()))?;

        let discarded = result.rows_affected();
        if discarded > 0 {
            debug!(parent_invite_id = %parent, discarded, "discarded dormant group invites");
        }
        Ok(discarded)
    }
}
