//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::StoreError;

/// Common surface of every UUID-backed identifier.
pub trait TypedId:
    Clone + std::fmt::Debug + PartialEq + Eq + std::hash::Hash + Send + Sync + 'static
{
    fn from_uuid(id: Uuid) -> Self;
    fn as_uuid(&self) -> Uuid;

    /// Generate a fresh, time-ordered identifier.
    fn generate() -> Self {
        Self::from_uuid(Uuid::now_v7())
    }

    /// Parse a textual identifier, rejecting anything that isn't a UUID.
    fn parse(s: &str) -> Result<Self, StoreError> {
        Uuid::try_parse(s)
            .map(Self::from_uuid)
            .map_err(|e| StoreError::MalformedInput(format!("invalid identifier {:?}: {}", s, e)))
    }
}

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl TypedId for $name {
            fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

typed_id!(
    /// User identifier.
    UserId
);
typed_id!(
    /// Organization identifier.
    OrganizationId
);
typed_id!(
    /// Group identifier. Groups are nested inside an organization.
    GroupId
);
typed_id!(
    /// Organization invite identifier.
    OrganizationInviteId
);
typed_id!(
    /// Group invite identifier.
    GroupInviteId
);
