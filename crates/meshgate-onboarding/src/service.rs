use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use meshgate_storage::{
    normalize_email, DormantInviteLedger, GroupId, GroupInvite, GroupInviteId, InviteEntity,
    InvitePage, InviteState, InviteStore, MembershipStore, OrganizationId, OrganizationInvite,
    OrganizationInviteId, PageParams, StoreError, TypedId, UserId, UserRole,
};
use tracing::{info, warn};

use crate::{
    CreateGroupInvite, CreateOrganizationInvite, InviteNotifier, OnboardingConfig,
    OnboardingError, OrganizationResponse, Responder, ResponseAction, TracingNotifier,
};

/// Onboarding use cases over the storage traits.
#[derive(Clone)]
pub struct OnboardingService {
    organization_invites: Arc<dyn InviteStore<OrganizationInvite>>,
    group_invites: Arc<dyn InviteStore<GroupInvite>>,
    ledger: Arc<dyn DormantInviteLedger>,
    memberships: Arc<dyn MembershipStore>,
    notifier: Arc<dyn InviteNotifier>,
    config: OnboardingConfig,
}

/// Only pending invites can be answered, and only by their invitee: the bound user when
/// known, otherwise whoever holds the invited email.
fn ensure_actionable<E: InviteEntity>(
    invite: &E,
    responder: &Responder,
) -> Result<(), OnboardingError> {
    if invite.state() != InviteState::Pending {
        return Err(OnboardingError::NotPending(invite.state()));
    }
    let addressed = match invite.invitee_id() {
        Some(user_id) => user_id == &responder.user_id,
        None => normalize_email(&responder.email).as_deref() == Some(invite.invitee_email()),
    };
    if !addressed {
        return Err(OnboardingError::NotInvitee);
    }
    Ok(())
}

fn checked_email(email: &str) -> Result<String, OnboardingError> {
    normalize_email(email).ok_or_else(|| OnboardingError::InvalidEmail(email.to_string()))
}

/// Memberships are granted at most once; an existing one satisfies the acceptance.
fn tolerate_existing(result: Result<(), StoreError>) -> Result<(), OnboardingError> {
    match result {
        Ok(()) | Err(StoreError::AlreadyExists) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl OnboardingService {
    pub fn new(
        organization_invites: Arc<dyn InviteStore<OrganizationInvite>>,
        group_invites: Arc<dyn InviteStore<GroupInvite>>,
        ledger: Arc<dyn DormantInviteLedger>,
        memberships: Arc<dyn MembershipStore>,
        config: OnboardingConfig,
    ) -> Self {
        Self {
            organization_invites,
            group_invites,
            ledger,
            memberships,
            notifier: Arc::new(TracingNotifier),
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn InviteNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &OnboardingConfig {
        &self.config
    }

    /// Page parameters with the configured default limit.
    pub fn page_params(&self) -> PageParams {
        PageParams::new().limit(self.config.default_page_limit)
    }

    async fn notify<E: InviteEntity>(&self, invite: &E) {
        let invite = invite.to_invite();
        if let Err(e) = self.notifier.invite_issued(E::KIND, &invite).await {
            warn!(
                kind = E::KIND.as_str(),
                invite_id = %invite.id,
                error = %e,
                "invite notification failed"
            );
        }
    }

    // ============ Create ============

    /// Create a pending organization invite plus dormant invites for every bundled group.
    ///
    /// Either the whole bundle is stored or, after a failure, the organization invite and
    /// any staged group invites are removed again.
    pub async fn create_organization_invite(
        &self,
        inviter: &UserId,
        request: CreateOrganizationInvite,
    ) -> Result<OrganizationInvite, OnboardingError> {
        if !request.role.is_invitable() {
            return Err(OnboardingError::RoleNotInvitable(
                request.role.as_str().to_string(),
            ));
        }
        let email = checked_email(&request.invitee_email)?;
        let mut seen = HashSet::new();
        for grant in &request.groups {
            if !seen.insert(grant.group_id.clone()) {
                return Err(OnboardingError::DuplicateGroup(grant.group_id.clone()));
            }
        }

        let now = Utc::now();
        let expires_at = now + self.config.invite_ttl;
        let invite = OrganizationInvite {
            id: OrganizationInviteId::generate(),
            organization_id: request.organization_id,
            invitee_id: request.invitee_id,
            invitee_email: email.clone(),
            inviter_id: inviter.clone(),
            role: request.role,
            created_at: now,
            expires_at,
            state: InviteState::Pending,
        };
        self.organization_invites
            .save_invites(std::slice::from_ref(&invite))
            .await?;

        if !request.groups.is_empty() {
            // Dormant children carry a placeholder expiry; activation replaces it.
            let children: Vec<GroupInvite> = request
                .groups
                .iter()
                .map(|grant| GroupInvite {
                    id: GroupInviteId::generate(),
                    group_id: grant.group_id.clone(),
                    invitee_id: None,
                    invitee_email: email.clone(),
                    inviter_id: inviter.clone(),
                    role: grant.role,
                    created_at: now,
                    expires_at,
                    state: InviteState::Dormant,
                })
                .collect();
            let child_ids: Vec<GroupInviteId> = children.iter().map(|c| c.id.clone()).collect();

            if let Err(e) = self.stage_bundle(&invite.id, &children, &child_ids).await {
                self.unwind_bundle(&invite.id, &child_ids).await;
                return Err(e.into());
            }
        }

        info!(
            invite_id = %invite.id,
            organization_id = %invite.organization_id,
            bundled_groups = request.groups.len(),
            "created organization invite"
        );
        self.notify(&invite).await;
        Ok(invite)
    }

    async fn stage_bundle(
        &self,
        parent: &OrganizationInviteId,
        children: &[GroupInvite],
        child_ids: &[GroupInviteId],
    ) -> Result<(), StoreError> {
        self.group_invites.save_invites(children).await?;
        self.ledger
            .save_dormant_invite_relations(parent, child_ids)
            .await
    }

    async fn unwind_bundle(&self, parent: &OrganizationInviteId, child_ids: &[GroupInviteId]) {
        for child in child_ids {
            match self.group_invites.remove_invite(child).await {
                // Children never written, or already gone with the links
                Ok(()) | Err(StoreError::NotFound) => {}
                Err(e) => {
                    warn!(invite_id = %child, error = %e, "failed to remove staged group invite")
                }
            }
        }
        if let Err(e) = self.organization_invites.remove_invite(parent).await {
            warn!(
                invite_id = %parent,
                error = %e,
                "failed to remove organization invite after bundle failure"
            );
        }
    }

    pub async fn create_group_invite(
        &self,
        inviter: &UserId,
        request: CreateGroupInvite,
    ) -> Result<GroupInvite, OnboardingError> {
        let email = checked_email(&request.invitee_email)?;
        let now = Utc::now();
        let invite = GroupInvite {
            id: GroupInviteId::generate(),
            group_id: request.group_id,
            invitee_id: request.invitee_id,
            invitee_email: email,
            inviter_id: inviter.clone(),
            role: request.role,
            created_at: now,
            expires_at: now + self.config.invite_ttl,
            state: InviteState::Pending,
        };
        self.group_invites
            .save_invites(std::slice::from_ref(&invite))
            .await?;

        info!(invite_id = %invite.id, group_id = %invite.group_id, "created group invite");
        self.notify(&invite).await;
        Ok(invite)
    }

    // ============ View ============

    pub async fn view_organization_invite(
        &self,
        id: &OrganizationInviteId,
    ) -> Result<OrganizationInvite, OnboardingError> {
        Ok(self.organization_invites.retrieve_invite_by_id(id).await?)
    }

    pub async fn view_group_invite(&self, id: &GroupInviteId) -> Result<GroupInvite, OnboardingError> {
        Ok(self.group_invites.retrieve_invite_by_id(id).await?)
    }

    // ============ Respond ============

    /// Accept or decline an organization invite.
    ///
    /// Accepting grants the membership and brings the bundled group invites to life with a
    /// fresh window; declining discards them.
    pub async fn respond_organization_invite(
        &self,
        responder: &Responder,
        id: &OrganizationInviteId,
        action: ResponseAction,
    ) -> Result<OrganizationResponse, OnboardingError> {
        let mut invite = self.organization_invites.retrieve_invite_by_id(id).await?;
        ensure_actionable(&invite, responder)?;

        match action {
            ResponseAction::Accept => {
                if invite.invitee_id.is_none() {
                    self.organization_invites
                        .resolve_invitee(&invite.invitee_email, &responder.user_id)
                        .await?;
                }
                tolerate_existing(
                    self.memberships
                        .add_organization_member(
                            &invite.organization_id,
                            &responder.user_id,
                            invite.role,
                        )
                        .await,
                )?;
                // The state flip and the cascade commit together; if either fails the invite
                // is still pending and the response can be retried.
                let activated = self
                    .ledger
                    .accept_and_activate(
                        id,
                        &responder.user_id,
                        Utc::now() + self.config.activation_ttl,
                    )
                    .await?;
                invite.invitee_id = Some(responder.user_id.clone());
                invite.state = InviteState::Accepted;
                for group_invite in &activated {
                    self.notify(group_invite).await;
                }

                info!(
                    invite_id = %id,
                    user_id = %responder.user_id,
                    activated = activated.len(),
                    "organization invite accepted"
                );
                Ok(OrganizationResponse { invite, activated })
            }
            ResponseAction::Decline => {
                self.organization_invites
                    .update_invite_state(id, InviteState::Declined)
                    .await?;
                invite.state = InviteState::Declined;
                let discarded = self.ledger.discard_dormant_invites(id).await?;

                info!(invite_id = %id, discarded, "organization invite declined");
                Ok(OrganizationResponse {
                    invite,
                    activated: Vec::new(),
                })
            }
        }
    }

    pub async fn respond_group_invite(
        &self,
        responder: &Responder,
        id: &GroupInviteId,
        action: ResponseAction,
    ) -> Result<GroupInvite, OnboardingError> {
        let mut invite = self.group_invites.retrieve_invite_by_id(id).await?;
        ensure_actionable(&invite, responder)?;

        match action {
            ResponseAction::Accept => {
                if invite.invitee_id.is_none() {
                    self.group_invites
                        .resolve_invitee(&invite.invitee_email, &responder.user_id)
                        .await?;
                }
                tolerate_existing(
                    self.memberships
                        .add_group_member(&invite.group_id, &responder.user_id, invite.role)
                        .await,
                )?;
                self.group_invites
                    .update_invite_state(id, InviteState::Accepted)
                    .await?;
                invite.invitee_id = Some(responder.user_id.clone());
                invite.state = InviteState::Accepted;
                info!(invite_id = %id, user_id = %responder.user_id, "group invite accepted");
            }
            ResponseAction::Decline => {
                self.group_invites
                    .update_invite_state(id, InviteState::Declined)
                    .await?;
                invite.state = InviteState::Declined;
                info!(invite_id = %id, "group invite declined");
            }
        }
        Ok(invite)
    }

    // ============ Revoke ============

    /// Remove an organization invite along with its still-dormant group invites.
    pub async fn revoke_organization_invite(
        &self,
        id: &OrganizationInviteId,
    ) -> Result<(), OnboardingError> {
        let discarded = self.ledger.discard_dormant_invites(id).await?;
        self.organization_invites.remove_invite(id).await?;
        info!(invite_id = %id, discarded, "organization invite revoked");
        Ok(())
    }

    pub async fn revoke_group_invite(&self, id: &GroupInviteId) -> Result<(), OnboardingError> {
        self.group_invites.remove_invite(id).await?;
        info!(invite_id = %id, "group invite revoked");
        Ok(())
    }

    // ============ List ============

    pub async fn list_organization_invites(
        &self,
        organization_id: &OrganizationId,
        page: &PageParams,
    ) -> Result<InvitePage<OrganizationInvite>, OnboardingError> {
        Ok(self
            .organization_invites
            .retrieve_invites_by_destination(organization_id, page)
            .await?)
    }

    pub async fn list_group_invites(
        &self,
        group_id: &GroupId,
        page: &PageParams,
    ) -> Result<InvitePage<GroupInvite>, OnboardingError> {
        Ok(self
            .group_invites
            .retrieve_invites_by_destination(group_id, page)
            .await?)
    }

    pub async fn list_organization_invites_by_user(
        &self,
        role: UserRole,
        user_id: &UserId,
        page: &PageParams,
    ) -> Result<InvitePage<OrganizationInvite>, OnboardingError> {
        Ok(self
            .organization_invites
            .retrieve_invites_by_user(role, user_id, page)
            .await?)
    }

    pub async fn list_group_invites_by_user(
        &self,
        role: UserRole,
        user_id: &UserId,
        page: &PageParams,
    ) -> Result<InvitePage<GroupInvite>, OnboardingError> {
        Ok(self
            .group_invites
            .retrieve_invites_by_user(role, user_id, page)
            .await?)
    }

    // ============ Claim ============

    /// Bind `user_id` to every unclaimed invite addressed to `email`, in both scopes.
    pub async fn claim_invites(&self, user_id: &UserId, email: &str) -> Result<u64, OnboardingError> {
        let email = checked_email(email)?;
        let organizations = self
            .organization_invites
            .resolve_invitee(&email, user_id)
            .await?;
        let groups = self.group_invites.resolve_invitee(&email, user_id).await?;

        info!(user_id = %user_id, organizations, groups, "claimed invites");
        Ok(organizations + groups)
    }
}
