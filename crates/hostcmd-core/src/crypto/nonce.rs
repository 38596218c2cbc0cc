// ============================================
// File: crates/hostcmd-core/src/crypto/nonce.rs
// ============================================
//! # Nonce Generation
//!
//! Every envelope carries 128 bits from the OS CSPRNG, hex-encoded.

use rand::rngs::OsRng;
use rand::RngCore;

use super::NONCE_SIZE;

/// Generates a fresh hex-encoded nonce (32 lowercase hex characters).
#[must_use]
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
