// ============================================
// File: crates/hostcmd-agent/src/handlers/mod.rs
// ============================================
//! # Message Handlers
//!
//! ## Creation Reason
//! Provides the per-message processing chain between the bus
//! subscription and the host.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`message`]: Filter, validate, rate-limit and execute one bus message
//!
//! ## Data Flow
//! ```text
//! BusMessage
//!   1. Drop anything that is not a `message` on the command channel
//!   2. Validate the signed envelope (nonce recorded on success)
//!   3. Apply the cooldown
//!   4. Execute the whitelisted action
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Nothing in here returns an error; every failure becomes a `Disposition`
//!
//! ## Last Modified
//! v0.1.0 - Initial handler structure

pub mod message;

pub use message::{Disposition, MessageHandler};
