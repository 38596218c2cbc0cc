// ============================================
// File: crates/hostcmd-core/src/crypto/secret.rs
// ============================================
//! # Shared Secret
//!
//! ## Creation Reason
//! Signer and validator share one symmetric key. It is read once at process
//! start and never changes afterwards; rotating it means restarting.
//!
//! ## Main Functionality
//! - `SharedSecret`: zeroizing wrapper around the key bytes
//! - `RunMode`: development / test / production, from `ENVIRONMENT`
//! - `load_secret`: reads the secret and enforces the production rule
//!
//! ## Loading Rules
//! ```text
//! secret set        → Some(secret)
//! secret unset/empty, development or test → None (warning)
//! secret unset/empty, production          → Err(SecretMissing)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Debug` is redacted; never add a `Display` impl
//! - A `None` secret makes the validator reject everything
//!
//! ## Last Modified
//! v0.1.0 - Initial secret store

use std::fmt;

use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{RUN_MODE_ENV, SIGNING_SECRET_ENV};
use crate::error::{CoreError, Result};

// ============================================
// SharedSecret
// ============================================

/// Shared HMAC key.
///
/// # Example
/// ```
/// use hostcmd_core::crypto::SharedSecret;
///
/// let secret = SharedSecret::new("test-secret").unwrap();
/// assert_eq!(format!("{secret:?}"), "SharedSecret([REDACTED])");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Wraps a secret string. Returns `None` for an empty secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret: String = secret.into();
        if secret.is_empty() {
            return None;
        }
        Some(Self(secret.into_bytes()))
    }

    /// Returns the raw key bytes.
    ///
    /// # Security Warning
    /// Do not log or persist the returned bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material
        write!(f, "SharedSecret([REDACTED])")
    }
}

// ============================================
// RunMode
// ============================================

/// Deployment mode of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Local development (default when unset).
    #[default]
    Development,
    /// Automated tests.
    Test,
    /// Anything else.
    Production,
}

impl RunMode {
    /// Parses the value of the `ENVIRONMENT` variable.
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("" | "development") => Self::Development,
            Some("test") => Self::Test,
            Some(_) => Self::Production,
        }
    }

    /// Reads the mode from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(RUN_MODE_ENV).ok().as_deref())
    }

    /// Returns `true` if the process may run without a secret.
    #[must_use]
    pub const fn allows_missing_secret(&self) -> bool {
        matches!(self, Self::Development | Self::Test)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        };
        f.write_str(name)
    }
}

// ============================================
// Loading
// ============================================

/// Loads the shared secret through `lookup` (normally `std::env::var`).
///
/// # Errors
/// Returns `SecretMissing` when the secret is absent in production mode.
pub fn load_secret<F>(mode: RunMode, lookup: F) -> Result<Option<SharedSecret>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(SIGNING_SECRET_ENV).and_then(SharedSecret::new) {
        Some(secret) => Ok(Some(secret)),
        None if mode.allows_missing_secret() => {
            warn!(
                mode = %mode,
                "{} is not set; host commands will be rejected",
                SIGNING_SECRET_ENV
            );
            Ok(None)
        }
        None => Err(CoreError::secret_missing(SIGNING_SECRET_ENV)),
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let owned: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| {
            owned
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_run_mode_parsing() {
        assert_eq!(RunMode::from_env_value(None), RunMode::Development);
        assert_eq!(RunMode::from_env_value(Some("development")), RunMode::Development);
        assert_eq!(RunMode::from_env_value(Some("test")), RunMode::Test);
        assert_eq!(RunMode::from_env_value(Some("production")), RunMode::Production);
        assert_eq!(RunMode::from_env_value(Some("staging")), RunMode::Production);
    }

    #[test]
    fn test_secret_loaded_when_present() {
        let secret = load_secret(
            RunMode::Production,
            env(&[(SIGNING_SECRET_ENV, "s3cret")]),
        )
        .unwrap()
        .unwrap();
        assert_eq!(secret.as_bytes(), b"s3cret");
    }

    #[test]
    fn test_production_requires_secret() {
        let err = load_secret(RunMode::Production, env(&[])).unwrap_err();
        assert!(err.is_config_error());

        let err = load_secret(RunMode::Production, env(&[(SIGNING_SECRET_ENV, "")])).unwrap_err();
        assert!(matches!(err, CoreError::SecretMissing { .. }));
    }

    #[test]
    fn test_dev_and_test_tolerate_missing_secret() {
        assert!(load_secret(RunMode::Development, env(&[])).unwrap().is_none());
        assert!(load_secret(RunMode::Test, env(&[])).unwrap().is_none());
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = SharedSecret::new("do-not-print").unwrap();
        assert!(!format!("{secret:?}").contains("do-not-print"));
    }
}
