//! Builds a [`VaultConfig`] from key/value lookups.
//!
//! The resolver never touches process state on its own: the lookup function
//! is injected. The binary uses [`from_process_env`] once at startup; tests
//! pass closures over maps or use `temp-env`.

use super::{BackupConfig, EnvironmentConfig, RateLimitConfig, VaultConfig};
use crate::error::VaultError;
use crate::security::ApiKey;

/// Comma-separated list of environment names
pub const ENVIRONMENTS_KEY: &str = "CMSVAULT_ENVIRONMENTS";

/// Environment names assumed when [`ENVIRONMENTS_KEY`] is unset
pub const DEFAULT_ENVIRONMENTS: &[&str] = &["production", "staging", "development"];

/// Resolves environment settings through an injected lookup.
pub struct ConfigResolver<F> {
    lookup: F,
}

impl<F> ConfigResolver<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Creates a resolver over the given lookup function
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Names of the candidate environments, lowercase and deduplicated
    pub fn environment_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.get(ENVIRONMENTS_KEY) {
            Some(list) => list
                .split(',')
                .map(|name| name.trim().to_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
            None => DEFAULT_ENVIRONMENTS.iter().map(|s| s.to_string()).collect(),
        };
        let mut seen = std::collections::HashSet::new();
        names.retain(|name| seen.insert(name.clone()));
        names
    }

    /// Resolves a single environment.
    ///
    /// # Errors
    /// Returns a configuration error naming the missing or invalid key
    pub fn resolve_environment(&self, name: &str) -> crate::Result<EnvironmentConfig> {
        let url_key = env_key(name, "URL");
        let api_key_key = env_key(name, "API_KEY");

        let url = self.get(&url_key).ok_or_else(|| {
            VaultError::configuration(format!(
                "environment '{}' is not configured: {} is not set",
                name, url_key
            ))
        })?;
        let api_key = self.get(&api_key_key).ok_or_else(|| {
            VaultError::configuration(format!(
                "environment '{}' has no credential: {} is not set",
                name, api_key_key
            ))
        })?;

        let mut environment = EnvironmentConfig::new(name, &url, ApiKey::new(api_key))?;
        if let Some(scheme) = self.get(&env_key(name, "AUTH_SCHEME")) {
            environment = environment.with_auth_scheme(scheme);
        }
        Ok(environment)
    }

    /// Resolves every candidate environment into an immutable config.
    ///
    /// Environments without a URL are treated as absent. An environment with
    /// a URL but an unusable key or URL is skipped with a warning, so one bad
    /// entry does not hide the others.
    ///
    /// # Errors
    /// Returns error if the rate-limit or backup options are invalid
    pub fn resolve(
        &self,
        rate_limit: RateLimitConfig,
        backup: BackupConfig,
    ) -> crate::Result<VaultConfig> {
        let mut config = VaultConfig::new(rate_limit, backup);

        for name in self.environment_names() {
            if self.get(&env_key(&name, "URL")).is_none() {
                tracing::debug!(environment = %name, "Environment not configured, skipping");
                continue;
            }

            match self.resolve_environment(&name) {
                Ok(environment) => config = config.with_environment(environment),
                Err(e) => {
                    tracing::warn!(environment = %name, error = %e, "Ignoring misconfigured environment");
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Resolver backed by the process environment
pub fn from_process_env() -> ConfigResolver<fn(&str) -> Option<String>> {
    ConfigResolver::new(process_env as fn(&str) -> Option<String>)
}

/// Variable name for a per-environment setting, e.g. `CMSVAULT_STAGING_URL`
pub fn env_key(environment: &str, suffix: &str) -> String {
    let normalized: String = environment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("CMSVAULT_{}_{}", normalized, suffix)
}
