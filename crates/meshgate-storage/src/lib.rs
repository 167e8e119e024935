//! Storage abstraction for meshgate.
//!
//! Backend crates (e.g., meshgate-store-sqlite) implement these traits so the
//! onboarding workflow doesn't depend on any specific database engine or schema details.
//!
//! Invites come in two variants, [`OrganizationInvite`] and [`GroupInvite`]. Both implement
//! [`InviteEntity`], which is all a backend needs to run the same invite engine against
//! either scope.

use thiserror::Error;

mod entity;
mod store;
pub mod types;

pub use entity::InviteEntity;
pub use store::*;
pub use types::*;

/// Uniform error type for all storage backends.
///
/// The string payloads carry the low-level cause for diagnostics; callers are expected to
/// branch on the variant only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("already exists")]
    AlreadyExists,
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("create failed: {0}")]
    CreateFailed(String),
    #[error("view failed: {0}")]
    ViewFailed(String),
    #[error("update failed: {0}")]
    UpdateFailed(String),
    #[error("remove failed: {0}")]
    RemoveFailed(String),
    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_carries_cause() {
        let err = StoreError::CreateFailed("disk I/O error".to_string());
        assert!(err.to_string().contains("create failed"));
        assert!(err.to_string().contains("disk I/O error"));

        let err = StoreError::MalformedInput("invalid id".to_string());
        assert!(err.to_string().starts_with("malformed input"));
    }

    #[test]
    fn test_store_error_unit_variants() {
        assert_eq!(StoreError::NotFound.to_string(), "not found");
        assert_eq!(StoreError::Conflict.to_string(), "conflict");
        assert_ne!(StoreError::NotFound, StoreError::Conflict);
    }
}
