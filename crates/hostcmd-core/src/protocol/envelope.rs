// ============================================
// File: crates/hostcmd-core/src/protocol/envelope.rs
// ============================================
//! # Command Envelope
//!
//! ## Main Functionality
//! - `CommandEnvelope`: the four signed fields carried on the bus
//!
//! ## Field Layout
//! | field | meaning                                   |
//! |-------|-------------------------------------------|
//! | cmd   | command identifier                        |
//! | ts    | signer's Unix time in seconds             |
//! | nonce | 128-bit random value, hex                 |
//! | sig   | HMAC-SHA256 over `cmd|ts|nonce`, hex      |
//!
//! ## Last Modified
//! v0.1.0 - Initial envelope definition

use serde::{Deserialize, Serialize};

use hostcmd_common::time::Timestamp;

use crate::crypto::{compute_signature, SharedSecret};
use crate::error::Result;

/// A signed host command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Command identifier.
    pub cmd: String,
    /// Signing time, Unix seconds.
    pub ts: i64,
    /// Hex-encoded nonce.
    pub nonce: String,
    /// Hex-encoded HMAC-SHA256 signature.
    pub sig: String,
}

impl CommandEnvelope {
    /// Builds and signs an envelope.
    ///
    /// # Errors
    /// Returns `SignatureCreation` if the MAC cannot be computed.
    pub fn signed(
        secret: &SharedSecret,
        cmd: impl Into<String>,
        ts: Timestamp,
        nonce: impl Into<String>,
    ) -> Result<Self> {
        let cmd = cmd.into();
        let nonce = nonce.into();
        let ts = ts.as_secs();
        let sig = compute_signature(secret, &cmd, ts, &nonce)?;
        Ok(Self { cmd, ts, nonce, sig })
    }

    /// Returns the signing time.
    #[must_use]
    pub const fn timestamp(&self) -> Timestamp {
        Timestamp::from_secs(self.ts)
    }
}
