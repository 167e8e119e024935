//! The capability set every invite variant exposes to the invite engine.

use crate::types::*;
use crate::StoreError;

/// Contract between an invite variant and the generic invite engine.
///
/// A backend is written once against this trait and instantiated per variant; nothing in the
/// engine branches on the concrete type. The table and column names are the only schema
/// knowledge a variant contributes.
pub trait InviteEntity: Clone + std::fmt::Debug + Send + Sync + 'static {
    type Id: TypedId;
    type Destination: TypedId;

    const KIND: DestinationKind;
    /// Backing table.
    const TABLE: &'static str;
    /// Column holding the destination reference (organization or group id).
    const DESTINATION_COLUMN: &'static str;

    fn id(&self) -> &Self::Id;
    fn destination_id(&self) -> &Self::Destination;
    fn invitee_id(&self) -> Option<&UserId>;
    fn invitee_email(&self) -> &str;
    fn inviter_id(&self) -> &UserId;
    fn state(&self) -> InviteState;

    /// Project into the variant-neutral shape.
    fn to_invite(&self) -> Invite;

    /// Rebuild the variant from the neutral shape.
    ///
    /// Fails with `MalformedInput` when the role isn't one this variant can grant through an
    /// invite or the email isn't usable.
    fn from_invite(invite: Invite) -> Result<Self, StoreError>;
}

fn checked_email(email: &str) -> Result<String, StoreError> {
    normalize_email(email)
        .ok_or_else(|| StoreError::MalformedInput(format!("invalid invitee email: {:?}", email)))
}

impl InviteEntity for OrganizationInvite {
    type Id = OrganizationInviteId;
    type Destination = OrganizationId;

    const KIND: DestinationKind = DestinationKind::Organization;
    const TABLE: &'static str = "organization_invites";
    const DESTINATION_COLUMN: &'static str = "organization_id";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn destination_id(&self) -> &Self::Destination {
        &self.organization_id
    }

    fn invitee_id(&self) -> Option<&UserId> {
        self.invitee_id.as_ref()
    }

    fn invitee_email(&self) -> &str {
        &self.invitee_email
    }

    fn inviter_id(&self) -> &UserId {
        &self.inviter_id
    }

    fn state(&self) -> InviteState {
        self.state
    }

    fn to_invite(&self) -> Invite {
        Invite {
            id: self.id.0,
            destination_id: self.organization_id.0,
            invitee_id: self.invitee_id.as_ref().map(|u| u.0),
            invitee_email: self.invitee_email.clone(),
            inviter_id: self.inviter_id.0,
            invitee_role: self.role.as_str().to_string(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            state: self.state,
        }
    }

    fn from_invite(invite: Invite) -> Result<Self, StoreError> {
        let role: OrganizationRole = invite
            .invitee_role
            .parse()
            .map_err(|e: ParseRoleError| StoreError::MalformedInput(e.to_string()))?;
        if !role.is_invitable() {
            return Err(StoreError::MalformedInput(format!(
                "role '{}' cannot be granted by invite",
                role.as_str()
            )));
        }

        Ok(OrganizationInvite {
            id: OrganizationInviteId(invite.id),
            organization_id: OrganizationId(invite.destination_id),
            invitee_id: invite.invitee_id.map(UserId),
            invitee_email: checked_email(&invite.invitee_email)?,
            inviter_id: UserId(invite.inviter_id),
            role,
            created_at: invite.created_at,
            expires_at: invite.expires_at,
            state: invite.state,
        })
    }
}

impl InviteEntity for GroupInvite {
    type Id = GroupInviteId;
    type Destination = GroupId;

    const KIND: DestinationKind = DestinationKind::Group;
    const TABLE: &'static str = "group_invites";
    const DESTINATION_COLUMN: &'static str = "group_id";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn destination_id(&self) -> &Self::Destination {
        &self.group_id
    }

    fn invitee_id(&self) -> Option<&UserId> {
        self.invitee_id.as_ref()
    }

    fn invitee_email(&self) -> &str {
        &self.invitee_email
    }

    fn inviter_id(&self) -> &UserId {
        &self.inviter_id
    }

    fn state(&self) -> InviteState {
        self.state
    }

    fn to_invite(&self) -> Invite {
        Invite {
            id: self.id.0,
            destination_id: self.group_id.0,
            invitee_id: self.invitee_id.as_ref().map(|u| u.0),
            invitee_email: self.invitee_email.clone(),
            inviter_id: self.inviter_id.0,
            invitee_role: self.role.as_str().to_string(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            state: self.state,
        }
    }

    fn from_invite(invite: Invite) -> Result<Self, StoreError> {
        let role: GroupRole = invite
            .invitee_role
            .parse()
            .map_err(|e: ParseRoleError| StoreError::MalformedInput(e.to_string()))?;

        Ok(GroupInvite {
            id: GroupInviteId(invite.id),
            group_id: GroupId(invite.destination_id),
            invitee_id: invite.invitee_id.map(UserId),
            invitee_email: checked_email(&invite.invitee_email)?,
            inviter_id: UserId(invite.inviter_id),
            role,
            created_at: invite.created_at,
            expires_at: invite.expires_at,
            state: invite.state,
        })
    }
}
