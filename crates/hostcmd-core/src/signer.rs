// ============================================
// File: crates/hostcmd-core/src/signer.rs
// ============================================
//! # Command Signer
//!
//! ## Creation Reason
//! The control plane turns a bare command name into a signed envelope
//! before publishing it on the bus.
//!
//! ## Main Functionality
//! - `CommandSigner::sign`: `ts = now`, fresh nonce, HMAC signature
//! - `CommandSigner::sign_payload`: same, encoded to wire bytes
//!
//! ## ⚠️ Important Note for Next Developer
//! - A signer without a secret fails every call with `SecretMissing`;
//!   it never emits an unsigned envelope
//!
//! ## Last Modified
//! v0.1.0 - Initial signer

use std::sync::Arc;

use hostcmd_common::time::{Clock, SystemClock, Timestamp};

use crate::crypto::{generate_nonce, SharedSecret, SIGNING_SECRET_ENV};
use crate::error::{CoreError, Result};
use crate::protocol::{encode_envelope, CommandEnvelope};

/// Builds signed command envelopes.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    secret: Option<Arc<SharedSecret>>,
    clock: Arc<dyn Clock>,
}

impl CommandSigner {
    /// Creates a signer using the system clock.
    #[must_use]
    pub fn new(secret: Option<Arc<SharedSecret>>) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    /// Creates a signer reading time from `clock`.
    #[must_use]
    pub fn with_clock(secret: Option<Arc<SharedSecret>>, clock: Arc<dyn Clock>) -> Self {
        Self { secret, clock }
    }

    /// Returns `true` if a secret is configured.
    #[must_use]
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Signs `cmd` at the current time with a fresh nonce.
    ///
    /// # Errors
    /// - `SecretMissing` if no secret is configured
    /// - `SignatureCreation` if the MAC cannot be computed
    pub fn sign(&self, cmd: &str) -> Result<CommandEnvelope> {
        self.sign_at(cmd, self.clock.now())
    }

    /// Signs `cmd` with an explicit timestamp and a fresh nonce.
    ///
    /// # Errors
    /// Same as [`CommandSigner::sign`].
    pub fn sign_at(&self, cmd: &str, ts: Timestamp) -> Result<CommandEnvelope> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| CoreError::secret_missing(SIGNING_SECRET_ENV))?;
        CommandEnvelope::signed(secret, cmd, ts, generate_nonce())
    }

    /// Signs `cmd` and encodes the envelope for publishing.
    ///
    /// # Errors
    /// Same as [`CommandSigner::sign`], plus `Encoding`.
    pub fn sign_payload(&self, cmd: &str) -> Result<Vec<u8>> {
        encode_envelope(&self.sign(cmd)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_signature;
    use crate::protocol::decode_envelope;
    use hostcmd_common::time::ManualClock;

    fn signer_at(secs: i64) -> CommandSigner {
        let secret = SharedSecret::new("shared").map(Arc::new);
        CommandSigner::with_clock(secret, Arc::new(ManualClock::new(secs)))
    }

    #[test]
    fn test_sign_uses_clock_and_fresh_nonce() {
        let signer = signer_at(1_700_000_000);
        let a = signer.sign("reboot").unwrap();
        let b = signer.sign("reboot").unwrap();

        assert_eq!(a.ts, 1_700_000_000);
        assert_eq!(a.nonce.len(), 32);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.sig, b.sig);
    }

    #[test]
    fn test_signature_matches_canonical_form() {
        let env = signer_at(77).sign("shutdown").unwrap();
        let secret = SharedSecret::new("shared").unwrap();
        assert!(verify_signature(&secret, "shutdown", 77, &env.nonce, &env.sig).is_ok());
    }

    #[test]
    fn test_payload_decodes() {
        let payload = signer_at(5).sign_payload("set_ip_addresses").unwrap();
        let env = decode_envelope(&payload).unwrap();
        assert_eq!(env.cmd, "set_ip_addresses");
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let signer = CommandSigner::new(None);
        assert!(!signer.has_secret());
        let err = signer.sign("reboot").unwrap_err();
        assert!(err.is_config_error());
    }
}
