// ============================================
// File: crates/hostcmd-core/src/lib.rs
// ============================================
//! # hostcmd Core - Signing & Validation Library
//!
//! ## Creation Reason
//! Holds everything that decides whether a host command is authentic:
//! the shared secret, the signed envelope format, the signer used by the
//! control plane and the validator used by the agent.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`crypto`]: Shared secret, HMAC-SHA256 signatures, nonce generation
//! - [`protocol`]: Command envelope and its JSON wire codec
//! - [`replay`]: Bounded FIFO nonce cache
//! - [`signer`]: Builds signed envelopes
//! - [`validator`]: Verifies inbound envelopes
//! - [`error`]: Core error types
//!
//! ## Validation Pipeline
//! ```text
//! raw bytes
//!    │
//!    ▼
//! ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐
//! │  decode  │─►│ complete │─►│  fresh   │─►│ not seen │─►│ HMAC ok  │─► cmd
//! └──────────┘  └──────────┘  └──────────┘  └──────────┘  └──────────┘
//!      │             │             │             │             │
//!      └─────────────┴─────────────┴──────┬──────┴─────────────┘
//!                                         ▼
//!                               logged + dropped (None)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Checks run cheapest first; the HMAC comparison is always last
//! - A nonce is recorded only after the signature verified
//! - The validator never returns an error to its caller, only `None`
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;
pub mod replay;
pub mod signer;
pub mod validator;

// Re-export primary types
pub use crypto::{RunMode, SharedSecret};
pub use error::{CoreError, Result};
pub use protocol::CommandEnvelope;
pub use replay::NonceCache;
pub use signer::CommandSigner;
pub use validator::{CommandValidator, ValidatorConfig};
