//! API key container with automatic memory zeroing.
//!
//! # Security
//! - The key is stored in a `Zeroizing<String>` container
//! - Memory is cleared when the key goes out of scope
//! - `Debug` and `Display` never print the key

use zeroize::{Zeroize, Zeroizing};

/// Default authorization scheme understood by Payload-style CMS APIs.
pub const DEFAULT_AUTH_SCHEME: &str = "users API-Key";

/// Keys shorter than this are not matched against artifact text; they
/// would collide with timestamps and counts.
pub const MIN_EXPOSURE_CHECK_LEN: usize = 8;

/// Secret API key sent with every request.
///
/// # Example
///
/// ```rust
/// use cmsvault_core::security::ApiKey;
///
/// let key = ApiKey::new("abc123".to_string());
/// assert_eq!(format!("{key:?}"), "ApiKey(****)");
/// assert_eq!(key.authorization_header("users API-Key"), "users API-Key abc123");
/// ```
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct ApiKey {
    secret: Zeroizing<String>,
}

impl ApiKey {
    /// Wraps a raw key, trimming surrounding whitespace
    pub fn new(secret: String) -> Self {
        let trimmed = secret.trim().to_string();
        Self {
            secret: Zeroizing::new(trimmed),
        }
    }

    /// True when the key is empty
    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    /// Builds the `Authorization` header value for the given scheme.
    ///
    /// The returned string contains the secret; it must only be handed to
    /// the transport, never logged.
    pub fn authorization_header(&self, scheme: &str) -> String {
        format!("{} {}", scheme, self.secret.as_str())
    }

    /// Checks whether `text` contains the secret verbatim.
    ///
    /// Used to verify artifacts before they are written. Keys shorter than
    /// [`MIN_EXPOSURE_CHECK_LEN`] never match.
    pub fn is_exposed_in(&self, text: &str) -> bool {
        self.secret.len() >= MIN_EXPOSURE_CHECK_LEN && text.contains(self.secret.as_str())
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(****)")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "****")
    }
}
