// ============================================
// File: crates/hostcmd-core/src/crypto/mac.rs
// ============================================
//! # Envelope Signatures
//!
//! ## Creation Reason
//! Binds the command name, the signing time and the nonce together under
//! the shared secret so none of them can be altered in transit.
//!
//! ## Main Functionality
//! - `signing_message`: canonical `cmd|ts|nonce` string
//! - `compute_signature`: lowercase hex HMAC-SHA256 of that string
//! - `verify_signature`: constant-time comparison of a received signature
//!
//! ## ⚠️ Important Note for Next Developer
//! - The canonical form is shared with every other signer; changing the
//!   separator or field order breaks interoperability
//! - Comparison happens on the hex text, so an uppercase signature is a
//!   mismatch
//!
//! ## Last Modified
//! v0.1.0 - Initial signature implementation

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::secret::SharedSecret;
use crate::error::{CoreError, Result};

/// HMAC-SHA256 instance.
pub type HmacSha256 = Hmac<Sha256>;

/// Builds the canonical message `"{cmd}|{ts}|{nonce}"`.
///
/// # Example
/// ```
/// use hostcmd_core::crypto::signing_message;
///
/// assert_eq!(signing_message("reboot", 1_700_000_000, "ab12"), "reboot|1700000000|ab12");
/// ```
#[must_use]
pub fn signing_message(cmd: &str, ts: i64, nonce: &str) -> String {
    format!("{cmd}|{ts}|{nonce}")
}

/// Computes the hex-encoded signature for an envelope.
///
/// # Errors
/// Returns `SignatureCreation` if the MAC cannot be keyed.
pub fn compute_signature(secret: &SharedSecret, cmd: &str, ts: i64, nonce: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        CoreError::SignatureCreation {
            reason: e.to_string(),
        }
    })?;
    mac.update(signing_message(cmd, ts, nonce).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies `sig` against the expected signature in constant time.
///
/// # Errors
/// Returns `SignatureVerification` on mismatch.
pub fn verify_signature(
    secret: &SharedSecret,
    cmd: &str,
    ts: i64,
    nonce: &str,
    sig: &str,
) -> Result<()> {
    let expected = compute_signature(secret, cmd, ts, nonce)?;

    // ct_eq on slices of different length returns false without leaking
    // where they differ
    if bool::from(expected.as_bytes().ct_eq(sig.as_bytes())) {
        Ok(())
    } else {
        Err(CoreError::SignatureVerification)
    }
}

// ============================================
// Tests
// ============================================
