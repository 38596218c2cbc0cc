// ============================================
// File: crates/hostcmd-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the signed command envelope exchanged between the control plane
//! and the agent, and its JSON wire form.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`envelope`]: The `CommandEnvelope` structure
//! - [`codec`]: JSON encoding and lenient, non-panicking decoding
//!
//! ## Wire Format
//! ```text
//! {"cmd":"reboot","ts":1700000000,"nonce":"<32 hex>","sig":"<64 hex>"}
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Other signers produce this format too; keep field names stable
//! - Decoding must never panic on hostile input
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod envelope;

pub use codec::{decode_envelope, encode_envelope};
pub use envelope::CommandEnvelope;
