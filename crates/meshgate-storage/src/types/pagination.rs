//! Listing parameters and result pages.

use std::str::FromStr;

use super::InviteState;
use crate::StoreError;

/// Upper bound for `PageParams::limit`.
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Limit used when the caller doesn't specify one.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Field a listing is ordered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OrderField {
    #[default]
    CreatedAt,
    ExpiresAt,
    State,
    InviteeEmail,
}

impl FromStr for OrderField {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(OrderField::CreatedAt),
            "expires_at" => Ok(OrderField::ExpiresAt),
            "state" => Ok(OrderField::State),
            "invitee_email" => Ok(OrderField::InviteeEmail),
            _ => Err(StoreError::MalformedInput(format!(
                "unsupported order field: {}",
                s
            ))),
        }
    }
}

impl OrderField {
    /// Column name shared by every invite table.
    pub fn column(&self) -> &'static str {
        match self {
            OrderField::CreatedAt => "created_at",
            OrderField::ExpiresAt => "expires_at",
            OrderField::State => "state",
            OrderField::InviteeEmail => "invitee_email",
        }
    }
}

/// Sort direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl FromStr for Direction {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(StoreError::MalformedInput(format!(
                "unsupported direction: {}",
                s
            ))),
        }
    }
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Which side of an invite a user-scoped listing looks at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserRole {
    Inviter,
    Invitee,
}

impl FromStr for UserRole {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inviter" => Ok(UserRole::Inviter),
            "invitee" => Ok(UserRole::Invitee),
            _ => Err(StoreError::MalformedInput(format!(
                "unsupported user role: {}",
                s
            ))),
        }
    }
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Inviter => "inviter",
            UserRole::Invitee => "invitee",
        }
    }
}

/// Pagination, ordering and filtering for invite listings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageParams {
    /// Number of invites to skip
    pub offset: u32,
    /// Maximum number of invites to return (1..=MAX_PAGE_LIMIT)
    pub limit: u32,
    pub order: OrderField,
    pub direction: Direction,
    /// Restrict results to a single state
    pub state: Option<InviteState>,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
            order: OrderField::default(),
            direction: Direction::default(),
            state: None,
        }
    }
}

impl PageParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn order(mut self, order: OrderField) -> Self {
        self.order = order;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn state(mut self, state: InviteState) -> Self {
        self.state = Some(state);
        self
    }

    /// Reject limits outside `1..=MAX_PAGE_LIMIT` and filters on dormant invites.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(StoreError::MalformedInput(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT, self.limit
            )));
        }
        if self.state == Some(InviteState::Dormant) {
            return Err(StoreError::MalformedInput(
                "dormant invites cannot be listed".to_string(),
            ));
        }
        Ok(())
    }
}

/// One page of a listing plus the total number of matching invites.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvitePage<E> {
    pub invites: Vec<E>,
    pub total: u64,
    pub offset: u32,
    pub limit: u32,
}
