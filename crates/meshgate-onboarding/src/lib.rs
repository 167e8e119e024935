//! Onboarding workflow for meshgate.
//!
//! [`OnboardingService`] composes the invite stores, the dormant relation ledger and the
//! membership store into the create/view/respond/revoke/list use cases. Transport layers
//! (HTTP, the admin CLI) call into this crate; authorization checks happen before that.

mod config;
mod error;
mod notify;
mod requests;
mod service;

pub use config::{ConfigError, OnboardingConfig};
pub use error::OnboardingError;
pub use notify::{InviteNotifier, NotifyError, TracingNotifier};
pub use requests::{
    CreateGroupInvite, CreateOrganizationInvite, GroupGrant, OrganizationResponse, Responder,
    ResponseAction,
};
pub use service::OnboardingService;
