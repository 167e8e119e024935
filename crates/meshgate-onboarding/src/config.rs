//! Workflow configuration.
//!
//! Supports configuration via environment variables:
//!
//! ```bash
//! MESHGATE_INVITE_TTL_HOURS=168      # lifetime of a new invite (default 7 days)
//! MESHGATE_ACTIVATION_TTL_HOURS=168  # lifetime of a bundled group invite once activated
//! MESHGATE_DEFAULT_PAGE_LIMIT=10     # page size when a listing doesn't set one
//! ```

use std::env;

use chrono::Duration;
use meshgate_storage::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use thiserror::Error;

const INVITE_TTL_VAR: &str = "MESHGATE_INVITE_TTL_HOURS";
const ACTIVATION_TTL_VAR: &str = "MESHGATE_ACTIVATION_TTL_HOURS";
const PAGE_LIMIT_VAR: &str = "MESHGATE_DEFAULT_PAGE_LIMIT";

/// Onboarding workflow configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingConfig {
    /// How long a newly created invite stays pending
    pub invite_ttl: Duration,
    /// Fresh window given to bundled group invites when their parent is accepted
    pub activation_ttl: Duration,
    /// Page size used when a listing doesn't specify one
    pub default_page_limit: u32,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            invite_ttl: Duration::days(7),
            activation_ttl: Duration::days(7),
            default_page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}. Expected a positive number of hours")]
    InvalidTtl { var: &'static str, value: String },

    #[error("Invalid value for {var}: {value:?}. Expected 1..={max}")]
    InvalidPageLimit {
        var: &'static str,
        value: String,
        max: u32,
    },
}

impl OnboardingConfig {
    /// Load configuration from environment variables, falling back to defaults for unset ones
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let invite_ttl = match env::var(INVITE_TTL_VAR) {
            Ok(value) => parse_ttl(INVITE_TTL_VAR, &value)?,
            Err(_) => defaults.invite_ttl,
        };
        let activation_ttl = match env::var(ACTIVATION_TTL_VAR) {
            Ok(value) => parse_ttl(ACTIVATION_TTL_VAR, &value)?,
            Err(_) => defaults.activation_ttl,
        };
        let default_page_limit = match env::var(PAGE_LIMIT_VAR) {
            Ok(value) => parse_page_limit(&value)?,
            Err(_) => defaults.default_page_limit,
        };

        Ok(Self {
            invite_ttl,
            activation_ttl,
            default_page_limit,
        })
    }
}

fn parse_ttl(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<i64>() {
        Ok(hours) if hours > 0 => Ok(Duration::hours(hours)),
        _ => Err(ConfigError::InvalidTtl {
            var,
            value: value.to_string(),
        }),
    }
}

fn parse_page_limit(value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(limit) if (1..=MAX_PAGE_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(ConfigError::InvalidPageLimit {
            var: PAGE_LIMIT_VAR,
            value: value.to_string(),
            max: MAX_PAGE_LIMIT,
        }),
    }
}
