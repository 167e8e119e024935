use chrono::{DateTime, Utc};
use meshgate_storage::{
    GroupId, GroupMember, GroupRole, MembershipStore, OrganizationId, OrganizationMember,
    OrganizationRole, StoreError, UserId,
};

use crate::{is_unique_violation, parse_uuid, SqliteStore};

#[derive(sqlx::FromRow)]
struct MemberRow {
    scope_id: String,
    user_id: String,
    role: String,
    joined_at: DateTime<Utc>,
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    if is_unique_violation(&e) {
        StoreError::AlreadyExists
    } else {
        StoreError::CreateFailed(e.to_string())
    }
}

#[async_trait::async_trait]
impl MembershipStore for SqliteStore {
    async fn add_organization_member(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
        role: OrganizationRole,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO organization_members(organization_id, user_id, role, joined_at)
             VALUES(?, ?, ?, ?)",
        )
        .bind(organization_id.to_string())
        .bind(user_id.to_string())
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;
        Ok(())
    }

    async fn add_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        role: GroupRole,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO group_members(group_id, user_id, role, joined_at) VALUES(?, ?, ?, ?)",
        )
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;
        Ok(())
    }

    async fn list_organization_members(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<OrganizationMember>, StoreError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT organization_id AS scope_id, user_id, role, joined_at
             FROM organization_members WHERE organization_id = ?
             ORDER BY joined_at, user_id",
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::ViewFailed(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(OrganizationMember {
                    organization_id: OrganizationId(parse_uuid(&row.scope_id)?),
                    user_id: UserId(parse_uuid(&row.user_id)?),
                    role: row
                        .role
                        .parse::<OrganizationRole>()
                        .map_err(|e| StoreError::MalformedInput(e.to_string()))?,
                    joined_at: row.joined_at,
                })
            })
            .collect()
    }

    async fn list_group_members(&self, group_id: &GroupId) -> Result<Vec<GroupMember>, StoreError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT group_id AS scope_id, user_id, role, joined_at
             FROM group_members WHERE group_id = ?
             ORDER BY joined_at, user_id",
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::ViewFailed(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(GroupMember {
                    group_id: GroupId(parse_uuid(&row.scope_id)?),
                    user_id: UserId(parse_uuid(&row.user_id)?),
                    role: row
                        .role
                        .parse::<GroupRole>()
                        .map_err(|e| StoreError::MalformedInput(e.to_string()))?,
                    joined_at: row.joined_at,
                })
            })
            .collect()
    }
}
