// ============================================
// File: crates/hostcmd-agent/src/lib.rs
// ============================================
//! # hostcmd Agent Library
//!
//! ## Creation Reason
//! Provides the device-side agent that listens for signed host commands
//! on the message bus and carries them out, plus the control-plane
//! dispatcher that sends them.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Agent configuration management
//! - [`agent`]: Subscription loop and lifecycle
//! - [`handlers`]: Per-message processing chain
//! - [`services`]: Host-side services
//!   - [`services::rate_limit`]: Per-command cooldown
//!   - [`services::executor`]: Whitelisted execution
//!   - [`services::supervisor`]: Device supervisor client
//!   - [`services::network`]: Address refresh
//!   - [`services::retry`]: Retry executor
//! - [`control`]: Control-plane dispatcher
//! - [`error`]: Agent-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        hostcmd Agent                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Config    │────►│    Agent    │────►│ MessageHandler  │    │
//! │  │             │     │  (loop)     │     │                 │    │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘    │
//! │                             │                     │             │
//! │                             │         ┌───────────┼──────────┐  │
//! │                             │         ▼           ▼          ▼  │
//! │                             │   ┌──────────┐ ┌─────────┐ ┌──────┐
//! │                             │   │Validator │ │  Rate   │ │Exec- │
//! │                             │   │ (core)   │ │ Limiter │ │utor  │
//! │                             │   └──────────┘ └─────────┘ └──────┘
//! ├─────────────────────────────┼───────────────────────────────────┤
//! │                     Transport Layer                             │
//! │  ┌──────────────────────────▼──────────────────────────────┐    │
//! │  │         MessageBus (Redis pub/sub + status keys)        │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! ControlPlane → sign → PUBLISH hostcmd → Agent → validate → cooldown → execute
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Production refuses to start without `HOSTCMD_SIGNING_SECRET`
//! - Configuration changes require restart (no hot-reload)
//! - `TESTING` set to anything non-empty turns on dry run
//!
//! ## Last Modified
//! v0.1.0 - Initial agent library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod config;
pub mod control;
pub mod error;
pub mod handlers;
pub mod services;

// Re-export primary types
pub use agent::{Agent, HOST_AGENT_READY_KEY};
pub use config::AgentConfig;
pub use control::{ControlPlane, Delivery};
pub use error::{AgentError, Result};
pub use handlers::{Disposition, MessageHandler};
