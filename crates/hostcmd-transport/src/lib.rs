// ============================================
// File: crates/hostcmd-transport/src/lib.rs
// ============================================
//! # hostcmd Transport - Message Bus Layer
//!
//! ## Creation Reason
//! Host commands travel over a shared pub/sub bus, and the agent reports
//! its readiness through status keys on the same server. This crate hides
//! the wire details behind traits so the agent can be tested without a
//! running Redis.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `Publisher`, `StatusStore`, `Subscription`, `MessageBus`
//! - [`resp`]: RESP2 frame codec
//! - [`redis`]: Redis implementation over a plain TCP stream
//! - [`memory`]: In-memory bus (test builds or `mock` feature)
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              hostcmd-agent                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   hostcmd-core         hostcmd-transport           │
//! │                        You are here ◄──            │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             hostcmd-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Connections
//! ```text
//!  agent ──── command connection ────► SET / PUBLISH
//!  agent ◄─── subscriber connection ── SUBSCRIBE hostcmd (push frames)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The bus carries opaque bytes; authentication happens in hostcmd-core
//! - A subscriber connection cannot issue regular commands, hence two
//!   connections
//! - No TLS and no bus-level authentication beyond the Redis password
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod memory;
pub mod redis;
pub mod resp;
pub mod traits;

// Re-export primary types
pub use error::{Result, TransportError};
pub use redis::{RedisBus, RedisEndpoint};
pub use traits::{BusMessage, MessageBus, MessageKind, Publisher, StatusStore, Subscription};

#[cfg(any(test, feature = "mock"))]
pub use memory::MemoryBus;
