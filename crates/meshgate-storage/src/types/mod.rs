//! Type definitions for meshgate storage.

mod ids;
mod invites;
mod memberships;
mod pagination;
mod roles;

// Re-export all types from submodules
pub use ids::*;
pub use invites::*;
pub use memberships::*;
pub use pagination::*;
pub use roles::*;
