// ============================================
// File: crates/hostcmd-agent/src/error.rs
// ============================================
//! # Agent Error Types
//!
//! ## Creation Reason
//! Collects every failure the agent and the control plane can report,
//! wrapping the lower crates' errors.
//!
//! ## Error Categories
//! 1. **Configuration**: unreadable or invalid config, missing secret
//! 2. **Privileged backends**: supervisor HTTP failures, retry exhaustion
//! 3. **Network refresh**: probe failures, interface enumeration
//! 4. **Wrapped**: core, transport, common, I/O
//!
//! ## ⚠️ Important Note for Next Developer
//! - Rejected or failed commands are NOT errors at this level; they are
//!   logged by the handler and never cross the subscription loop
//! - Only `is_fatal()` errors should stop the process
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use hostcmd_core::error::CoreError;
use hostcmd_transport::error::TransportError;

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        path: String,
        reason: String,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        field: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    ConfigMissing {
        field: String,
    },

    #[error("Agent failed to start: {reason}")]
    StartupFailed {
        reason: String,
    },

    #[error("Supervisor rejected {action}: HTTP {status}")]
    SupervisorStatus {
        action: String,
        status: u16,
    },

    #[error("Supervisor request for {action} failed: {reason}")]
    SupervisorRequest {
        action: String,
        reason: String,
    },

    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: String,
    },

    #[error("Connectivity probe failed: {reason}")]
    Probe {
        reason: String,
    },

    #[error("Failed to enumerate network interfaces: {reason}")]
    Interfaces {
        reason: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn config_missing(field: impl Into<String>) -> Self {
        Self::ConfigMissing {
            field: field.into(),
        }
    }

    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. }
                | Self::ConfigInvalid { .. }
                | Self::ConfigMissing { .. }
                | Self::Core(CoreError::SecretMissing { .. })
        )
    }

    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. }
                | Self::ConfigInvalid { .. }
                | Self::ConfigMissing { .. }
                | Self::StartupFailed { .. }
                | Self::Core(CoreError::SecretMissing { .. })
        )
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::SupervisorRequest { .. } | Self::Probe { .. } => true,
            Self::SupervisorStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
