//! Request budget configuration.
//!
//! Controls how hard the client may push the remote API: how many requests
//! may be in flight, how far apart dispatches are spaced, how long a single
//! request may take and how many documents a page holds.

use crate::models::ManifestRateLimit;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on `concurrency`
pub const MAX_CONCURRENCY: usize = 50;

/// Upper bound on `batch_size`
pub const MAX_BATCH_SIZE: u32 = 1000;

/// Rate-limit parameters for the API client.
///
/// # Example
/// ```rust
/// use cmsvault_core::config::RateLimitConfig;
///
/// let config = RateLimitConfig::new()
///     .with_concurrency(2)
///     .with_delay_ms(250);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.delay().as_millis(), 250);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum simultaneously in-flight requests
    pub concurrency: usize,
    /// Minimum spacing between two request dispatches (milliseconds)
    pub delay_ms: u64,
    /// Default page size for data queries
    pub batch_size: u32,
    /// Per-request timeout (milliseconds)
    pub timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            delay_ms: 100,
            batch_size: 100,
            timeout_ms: 30_000,
        }
    }
}

impl RateLimitConfig {
    /// Creates a new rate-limit config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the concurrency cap (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Builder method to set the pacing delay.
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Builder method to set the page size.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builder method to set the per-request timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Pacing delay as a `Duration`
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates the request budget.
    ///
    /// # Errors
    /// Returns error if a value is zero or exceeds its safety bound
    pub fn validate(&self) -> crate::Result<()> {
        if self.concurrency == 0 {
            return Err(crate::error::VaultError::configuration(
                "concurrency must be greater than 0",
            ));
        }

        if self.concurrency > MAX_CONCURRENCY {
            return Err(crate::error::VaultError::configuration(format!(
                "concurrency should not exceed {} for safety",
                MAX_CONCURRENCY
            )));
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(crate::error::VaultError::configuration(format!(
                "batch_size must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }

        if self.timeout_ms == 0 {
            return Err(crate::error::VaultError::configuration(
                "timeout_ms must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Snapshot recorded in the metadata manifest
    pub fn to_manifest(&self) -> ManifestRateLimit {
        ManifestRateLimit {
            concurrency: self.concurrency,
            delay_ms: self.delay_ms,
            batch_size: self.batch_size,
            timeout_ms: self.timeout_ms,
        }
    }
}
