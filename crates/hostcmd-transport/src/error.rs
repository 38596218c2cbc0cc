// ============================================
// File: crates/hostcmd-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for bus connections, the RESP codec and server
//! replies.
//!
//! ## Error Categories
//! 1. **Connection Errors**: connect failures, timeouts, closed streams
//! 2. **Protocol Errors**: undecodable frames, unexpected replies
//! 3. **Server Errors**: `-ERR ...` replies from Redis
//!
//! ## ⚠️ Important Note for Next Developer
//! - Connection errors are usually transient; protocol errors are not
//! - Never put the Redis password into an error message
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Connection Errors
    // ========================================

    /// Failed to connect to the bus server.
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectFailed {
        /// `host:port` we tried
        addr: String,
        /// Why connecting failed
        reason: String,
    },

    /// The peer closed the connection.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Operation timed out.
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// What operation timed out
        operation: String,
    },

    // ========================================
    // Protocol Errors
    // ========================================

    /// Received bytes are not valid RESP.
    #[error("Protocol error: {reason}")]
    Protocol {
        /// What's wrong with the frame
        reason: String,
    },

    /// Reply had an unexpected shape.
    #[error("Unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        /// Command that was sent
        command: String,
        /// Debug rendering of the reply
        reply: String,
    },

    /// Server answered with an error reply.
    #[error("Server error: {message}")]
    Server {
        /// Error text sent by the server
        message: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(addr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            addr: addr.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Protocol` error.
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    /// Creates an `UnexpectedReply` error.
    pub fn unexpected_reply(command: impl Into<String>, reply: impl std::fmt::Debug) -> Self {
        Self::UnexpectedReply {
            command: command.into(),
            reply: format!("{reply:?}"),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectFailed { .. } | Self::ConnectionClosed | Self::Timeout { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }

    /// Returns `true` if the connection that produced this error is unusable.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. }
                | Self::ConnectionClosed
                | Self::Timeout { .. }
                | Self::Protocol { .. }
                | Self::Io { .. }
        )
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::connect_failed("redis:6379", "connection refused");
        assert!(err.to_string().contains("redis:6379"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_classification() {
        assert!(TransportError::ConnectionClosed.is_retryable());
        assert!(TransportError::ConnectionClosed.is_connection_error());

        let server = TransportError::Server {
            message: "NOAUTH".into(),
        };
        assert!(!server.is_retryable());
        assert!(!server.is_connection_error());

        assert!(!TransportError::protocol("bad frame").is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let err: TransportError = io_err.into();
        assert!(err.is_retryable());
    }
}
