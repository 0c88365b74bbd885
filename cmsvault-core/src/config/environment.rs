//! Per-environment connection configuration.
//!
//! An environment is a named deployment of the remote CMS (production,
//! staging, …) with its own base URL and API key.

use crate::error::{VaultError, redact_url};
use crate::security::{ApiKey, DEFAULT_AUTH_SCHEME};
use url::Url;

/// Connection settings for one named environment.
///
/// # Security
/// The API key is held in a zeroizing container and the `Display`
/// implementation only prints the redacted base URL.
///
/// # Example
/// ```rust
/// use cmsvault_core::config::EnvironmentConfig;
/// use cmsvault_core::security::ApiKey;
///
/// let env = EnvironmentConfig::new(
///     "staging",
///     "https://cms.example.com/api",
///     ApiKey::new("key".to_string()),
/// )
/// .unwrap();
///
/// let url = env.endpoint(&["users", "count"]).unwrap();
/// assert_eq!(url.as_str(), "https://cms.example.com/api/users/count");
/// ```
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// Environment name (lowercase)
    pub name: String,
    /// Base URL of the REST API, e.g. `https://cms.example.com/api`
    pub base_url: Url,
    /// Credential sent on every request
    pub api_key: ApiKey,
    /// Scheme prefix of the authorization header
    pub auth_scheme: String,
}

impl EnvironmentConfig {
    /// Creates and validates an environment configuration.
    ///
    /// # Errors
    /// Returns error if the URL is malformed, not http(s), or the key is empty
    pub fn new(name: impl Into<String>, base_url: &str, api_key: ApiKey) -> crate::Result<Self> {
        let name = name.into().trim().to_lowercase();
        let base_url = Url::parse(base_url.trim()).map_err(|e| {
            VaultError::configuration(format!(
                "Invalid base URL for environment '{}': {}",
                name, e
            ))
        })?;

        let config = Self {
            name,
            base_url,
            api_key,
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Builder method to override the authorization scheme.
    pub fn with_auth_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.auth_scheme = scheme.into();
        self
    }

    /// Validates the environment configuration.
    ///
    /// # Errors
    /// Returns error if any field is unusable
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(VaultError::configuration("environment name cannot be empty"));
        }

        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(VaultError::configuration(format!(
                "base URL for environment '{}' must use http or https",
                self.name
            )));
        }

        if self.base_url.host_str().is_none() {
            return Err(VaultError::configuration(format!(
                "base URL for environment '{}' has no host",
                self.name
            )));
        }

        if self.api_key.is_empty() {
            return Err(VaultError::configuration(format!(
                "API key for environment '{}' cannot be empty",
                self.name
            )));
        }

        if self.auth_scheme.trim().is_empty() {
            return Err(VaultError::configuration(format!(
                "authorization scheme for environment '{}' cannot be empty",
                self.name
            )));
        }

        Ok(())
    }

    /// Builds an endpoint URL by appending path segments to the base URL.
    ///
    /// Segments are percent-encoded, so collection slugs cannot escape the
    /// API path.
    pub fn endpoint(&self, segments: &[&str]) -> crate::Result<Url> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                VaultError::configuration(format!(
                    "base URL for environment '{}' cannot carry a path",
                    self.name
                ))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    /// Base URL with credentials masked
    pub fn redacted_url(&self) -> String {
        redact_url(self.base_url.as_str())
    }

    /// Value of the `Authorization` header
    pub fn authorization(&self) -> String {
        self.api_key.authorization_header(&self.auth_scheme)
    }
}

impl std::fmt::Display for EnvironmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.redacted_url())
    }
}
