//! Configuration types for backup runs.
//!
//! Configuration is resolved once into an immutable [`VaultConfig`] and
//! passed into constructors; nothing in the core reads the process
//! environment on its own.
//!
//! # Module Structure
//! - `rate_limit`: request budget of the API client
//! - `environment`: base URL and credential per environment
//! - `backup`: output location and query options
//! - `filter`: glob-based collection exclusion
//! - `resolver`: builds a `VaultConfig` from key/value lookups

mod backup;
mod environment;
mod filter;
mod rate_limit;
mod resolver;

pub use backup::{BackupConfig, DEFAULT_OUTPUT_DIR};
pub use environment::EnvironmentConfig;
pub use filter::{CollectionFilter, glob_match};
pub use rate_limit::{MAX_BATCH_SIZE, MAX_CONCURRENCY, RateLimitConfig};
pub use resolver::{
    ConfigResolver, DEFAULT_ENVIRONMENTS, ENVIRONMENTS_KEY, env_key, from_process_env,
};

use crate::error::VaultError;
use std::collections::BTreeMap;

/// Complete, validated configuration for one invocation.
#[derive(Debug, Clone, Default)]
pub struct VaultConfig {
    pub environments: BTreeMap<String, EnvironmentConfig>,
    pub rate_limit: RateLimitConfig,
    pub backup: BackupConfig,
}

impl VaultConfig {
    /// Creates a configuration with no environments
    pub fn new(rate_limit: RateLimitConfig, backup: BackupConfig) -> Self {
        Self {
            environments: BTreeMap::new(),
            rate_limit,
            backup,
        }
    }

    /// Builder method to register an environment, replacing one of the same name.
    pub fn with_environment(mut self, environment: EnvironmentConfig) -> Self {
        self.environments
            .insert(environment.name.clone(), environment);
        self
    }

    /// Looks up an environment by name (case-insensitive).
    ///
    /// # Errors
    /// Returns a configuration error listing the known environments
    pub fn environment(&self, name: &str) -> crate::Result<&EnvironmentConfig> {
        let key = name.trim().to_lowercase();
        self.environments.get(&key).ok_or_else(|| {
            let known = self.environment_names();
            VaultError::configuration(format!(
                "Unknown environment '{}' (configured: {})",
                name,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ))
        })
    }

    /// Names of configured environments, sorted
    pub fn environment_names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    /// Validates every part of the configuration.
    ///
    /// # Errors
    /// Returns the first validation failure
    pub fn validate(&self) -> crate::Result<()> {
        self.rate_limit.validate()?;
        self.backup.validate()?;
        for environment in self.environments.values() {
            environment.validate()?;
        }
        Ok(())
    }
}
