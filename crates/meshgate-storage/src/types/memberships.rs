//! Membership records created when an invite is accepted.

use chrono::{DateTime, Utc};

use super::{GroupId, GroupRole, OrganizationId, OrganizationRole, UserId};

/// Organization member record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrganizationMember {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role: OrganizationRole,
    pub joined_at: DateTime<Utc>,
}

/// Group member record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMember {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}
