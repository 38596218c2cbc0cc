// ============================================
// File: crates/hostcmd-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types for signing and validating command envelopes.
//!
//! ## Error Categories
//! 1. **Configuration**: the shared secret is missing
//! 2. **Envelope**: undecodable or incomplete payloads
//! 3. **Authentication**: stale timestamps, replayed nonces, bad signatures
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include the secret or the expected signature in error messages
//! - Every rejection variant has a stable `reason()` label used in logs
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for signing and validation.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Configuration Errors
    // ========================================

    /// The shared signing secret is not configured.
    #[error("{env} is required")]
    SecretMissing {
        /// Environment variable that should hold the secret
        env: String,
    },

    // ========================================
    // Envelope Errors
    // ========================================

    /// Payload could not be decoded into an envelope.
    #[error("Malformed envelope: {reason}")]
    MalformedEnvelope {
        /// What's wrong with the payload
        reason: String,
    },

    /// A required envelope field is missing or empty.
    #[error("Incomplete envelope: field '{field}' missing or empty")]
    IncompleteEnvelope {
        /// Name of the offending field
        field: &'static str,
    },

    /// Envelope could not be serialized.
    #[error("Failed to encode envelope: {reason}")]
    Encoding {
        /// Serializer message
        reason: String,
    },

    // ========================================
    // Authentication Errors
    // ========================================

    /// Envelope timestamp is outside the freshness window.
    #[error("Stale envelope: ts={ts}, now={now}, max_age={max_age}s")]
    StaleTimestamp {
        /// Timestamp carried by the envelope
        ts: i64,
        /// Validator's current time
        now: i64,
        /// Allowed distance in seconds
        max_age: u64,
    },

    /// Nonce was already accepted.
    #[error("Replay detected: nonce already accepted")]
    ReplayDetected,

    /// Signature does not match.
    #[error("Signature verification failed")]
    SignatureVerification,

    /// Signature could not be computed.
    #[error("Failed to create signature: {reason}")]
    SignatureCreation {
        /// Why signing failed
        reason: String,
    },
}

impl CoreError {
    /// Creates a `SecretMissing` error.
    pub fn secret_missing(env: impl Into<String>) -> Self {
        Self::SecretMissing { env: env.into() }
    }

    /// Creates a `MalformedEnvelope` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            reason: reason.into(),
        }
    }

    /// Creates an `IncompleteEnvelope` error.
    pub const fn incomplete(field: &'static str) -> Self {
        Self::IncompleteEnvelope { field }
    }

    /// Creates a `StaleTimestamp` error.
    pub const fn stale(ts: i64, now: i64, max_age: u64) -> Self {
        Self::StaleTimestamp { ts, now, max_age }
    }

    /// Short, stable label for the rejection, suitable as a log field.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::SecretMissing { .. } => "no_secret",
            Self::MalformedEnvelope { .. } => "malformed",
            Self::IncompleteEnvelope { .. } => "incomplete",
            Self::Encoding { .. } => "encoding",
            Self::StaleTimestamp { .. } => "stale",
            Self::ReplayDetected => "replay",
            Self::SignatureVerification => "invalid_signature",
            Self::SignatureCreation { .. } => "signing_failed",
        }
    }

    /// Returns `true` for configuration problems.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::SecretMissing { .. })
    }

    /// Returns `true` if this error might indicate an attack.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::SignatureVerification | Self::ReplayDetected | Self::StaleTimestamp { .. }
        )
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::secret_missing("HOSTCMD_SIGNING_SECRET");
        assert_eq!(err.to_string(), "HOSTCMD_SIGNING_SECRET is required");

        let err = CoreError::stale(100, 3_700, 60);
        assert!(err.to_string().contains("ts=100"));
        assert!(err.to_string().contains("max_age=60s"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::secret_missing("X").is_config_error());
        assert!(CoreError::SignatureVerification.is_suspicious());
        assert!(CoreError::ReplayDetected.is_suspicious());
        assert!(!CoreError::incomplete("sig").is_suspicious());
    }

    #[test]
    fn test_reason_labels_are_distinct() {
        let reasons = [
            CoreError::malformed("x").reason(),
            CoreError::incomplete("cmd").reason(),
            CoreError::stale(0, 0, 0).reason(),
            CoreError::ReplayDetected.reason(),
            CoreError::SignatureVerification.reason(),
        ];
        let unique: std::collections::HashSet<_> = reasons.iter().collect();
        assert_eq!(unique.len(), reasons.len());
    }
}
