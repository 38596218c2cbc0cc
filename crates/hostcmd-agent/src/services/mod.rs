// ============================================
// File: crates/hostcmd-agent/src/services/mod.rs
// ============================================
//! # Agent Services
//!
//! ## Creation Reason
//! Holds the host-side logic behind the message handler, separated from
//! the bus and from envelope validation.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`rate_limit`]: Per-command cooldown
//! - [`executor`]: Whitelist lookup and dispatch
//! - [`supervisor`]: Device supervisor HTTP client
//! - [`network`]: `set_ip_addresses` refresh
//! - [`retry`]: Fixed-delay retry executor
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐   ┌─────────────────────────────────┐  │
//! │  │  RateLimiter    │──►│      CommandExecutor            │  │
//! │  │  - cooldown     │   │  - whitelist                    │  │
//! │  └─────────────────┘   │  - dry run                      │  │
//! │                        └───────┬─────────────┬───────────┘  │
//! │                                │             │              │
//! │              ┌─────────────────▼──┐   ┌──────▼───────────┐  │
//! │              │ PrivilegedBackend  │   │ NetworkRefresher │  │
//! │              │ - sudo systemctl   │   │ - probe (retry)  │  │
//! │              │ - supervisor(retry)│   │ - getifaddrs     │  │
//! │              └────────────────────┘   └──────────────────┘  │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every external effect sits behind a trait (`CommandRunner`,
//!   `PowerBackend`, `ConnectivityProbe`, `AddressSource`) so tests never
//!   touch the host
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod executor;
pub mod network;
pub mod rate_limit;
pub mod retry;
pub mod supervisor;

// Re-export primary types
pub use executor::{
    CommandExecutor, CommandRunner, Execution, ExecutionOutcome, ExecutionState, HostAction,
    PrivilegedBackend, RunResult, SystemRunner,
};
pub use network::{
    AddressSource, ConnectivityProbe, HttpProbe, NetworkRefresh, NetworkRefresher,
    SystemInterfaces,
};
pub use rate_limit::RateLimiter;
pub use retry::{retry, RetryError, RetryPolicy};
pub use supervisor::{request_with_retry, PowerAction, PowerBackend, SupervisorClient};
