//! Security utilities for credential protection.
//!
//! # Security Guarantees
//! - API keys are stored in `Zeroizing` containers for automatic memory clearing
//! - Keys are never rendered by `Debug`/`Display`
//! - URLs are redacted before they reach logs, errors or artifacts
//!
//! # Module Structure
//! - `credentials`: API key container and authorization header construction

mod credentials;

pub use credentials::{ApiKey, DEFAULT_AUTH_SCHEME, MIN_EXPOSURE_CHECK_LEN};
