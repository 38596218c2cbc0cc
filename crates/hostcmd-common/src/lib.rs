// ============================================
// File: crates/hostcmd-common/src/lib.rs
// ============================================
//! # hostcmd Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Provides foundational types and utilities shared across all hostcmd crates,
//! so that timestamps and command names mean the same thing on
//! the control plane and on the agent.
//!
//! ## Main Functionality
//! - [`types`]: Core type definitions (`CommandName`, well-known commands)
//! - [`time`]: Unix timestamps and injectable clocks
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              hostcmd-agent                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   hostcmd-core         hostcmd-transport           │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             hostcmd-common  ◄── You are here      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//! - All public types should implement standard traits (Debug, Clone, etc.)
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use types::CommandName;
