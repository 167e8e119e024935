//! The store traits that backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::{InviteEntity, StoreError};

/// Generic invite store, instantiated once per invite variant.
///
/// Every read path brings time-based state up to date before it looks at the data: a
/// `pending` invite whose `expires_at` has passed is reported (and persisted) as `expired`.
/// Dormant invites are never returned.
#[async_trait::async_trait]
pub trait InviteStore<E: InviteEntity>: Send + Sync {
    /// Insert invites atomically.
    ///
    /// An invite's slot is its destination together with its email and, when bound, its
    /// invitee. Stale pending invites in the slot are expired in the same transaction; a
    /// still-live one makes the whole call fail with `Conflict`.
    async fn save_invites(&self, invites: &[E]) -> Result<(), StoreError>;

    /// Get an invite by ID.
    async fn retrieve_invite_by_id(&self, id: &E::Id) -> Result<E, StoreError>;

    /// Hard-delete an invite. Exactly one row must be removed.
    async fn remove_invite(&self, id: &E::Id) -> Result<(), StoreError>;

    /// Overwrite the state of an invite. Callers are responsible for transition legality.
    async fn update_invite_state(&self, id: &E::Id, state: InviteState) -> Result<(), StoreError>;

    /// List invites granting access to a destination.
    async fn retrieve_invites_by_destination(
        &self,
        destination: &E::Destination,
        page: &PageParams,
    ) -> Result<InvitePage<E>, StoreError>;

    /// List invites where the user is inviter or invitee.
    async fn retrieve_invites_by_user(
        &self,
        role: UserRole,
        user_id: &UserId,
        page: &PageParams,
    ) -> Result<InvitePage<E>, StoreError>;

    /// Bind `user_id` as invitee on every invite addressed to `email` that has no invitee yet.
    /// A pending invite stays unbound while `user_id` already holds a pending invite into the
    /// same destination. Returns the number of invites bound.
    async fn resolve_invitee(&self, email: &str, user_id: &UserId) -> Result<u64, StoreError>;
}

/// Parent -> children links for group invites staged behind an organization invite.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait DormantInviteLedger: Send + Sync {
    /// Link already-created dormant group invites to their parent organization invite.
    async fn save_dormant_invite_relations(
        &self,
        parent: &OrganizationInviteId,
        children: &[GroupInviteId],
    ) -> Result<(), StoreError>;

    /// Promote the dormant children of `parent` to `pending`, addressed to `invitee` and
    /// expiring at `expires_at`. Returns only the invites activated by this call, so a repeated
    /// call for the same parent returns nothing.
    async fn activate_group_invites(
        &self,
        parent: &OrganizationInviteId,
        invitee: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<GroupInvite>, StoreError>;

    /// Move `parent` from `pending` to `accepted`, binding `invitee` if it has none, and
    /// activate its dormant children as [`Self::activate_group_invites`] does, all in one
    /// transaction. Fails with `Conflict` when `parent` is no longer pending.
    async fn accept_and_activate(
        &self,
        parent: &OrganizationInviteId,
        invitee: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<GroupInvite>, StoreError>;

    /// Delete the still-dormant children of `parent`. Returns how many were deleted.
    async fn discard_dormant_invites(&self, parent: &OrganizationInviteId)
        -> Result<u64, StoreError>;
}

/// Organization and group membership granted by accepted invites.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait MembershipStore: Send + Sync {
    /// Add a user to an organization. Fails with `AlreadyExists` for existing members.
    async fn add_organization_member(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
        role: OrganizationRole,
    ) -> Result<(), StoreError>;

    /// Add a user to a group. Fails with `AlreadyExists` for existing members.
    async fn add_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        role: GroupRole,
    ) -> Result<(), StoreError>;

    async fn list_organization_members(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<OrganizationMember>, StoreError>;

    async fn list_group_members(&self, group_id: &GroupId)
        -> Result<Vec<GroupMember>, StoreError>;
}
