// ============================================
// File: crates/hostcmd-transport/src/traits.rs
// ============================================
//! # Bus Traits
//!
//! ## Creation Reason
//! Defines the publish/subscribe and status-key interfaces the agent and
//! the control plane depend on, so that a Redis server and an in-memory
//! test double are interchangeable.
//!
//! ## Main Functionality
//! - `BusMessage`: one frame delivered to a subscriber
//! - `Publisher`: fire-and-forget publishing
//! - `StatusStore`: string key/value status flags
//! - `Subscription`: ordered stream of inbound messages
//! - `MessageBus`: all of the above from one endpoint
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be Send + Sync for use in async contexts
//! - `Subscription::next_message` returning `Ok(None)` means the stream
//!   ended cleanly; the agent treats that as shutdown
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

// ============================================
// BusMessage
// ============================================

/// Kind of a subscriber frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// A published payload.
    Message,
    /// Subscription confirmation.
    Subscribe,
    /// Unsubscription confirmation.
    Unsubscribe,
    /// Anything else (pattern messages, pongs, ...).
    Other(String),
}

impl MessageKind {
    /// Maps the first element of a push frame.
    #[must_use]
    pub fn from_wire(kind: &str) -> Self {
        match kind.to_ascii_lowercase().as_str() {
            "message" => Self::Message,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns `true` for subscribe/unsubscribe confirmations.
    #[must_use]
    pub const fn is_confirmation(&self) -> bool {
        matches!(self, Self::Subscribe | Self::Unsubscribe)
    }

    /// Returns `true` for the `pong` reply to a subscriber-mode `PING`.
    #[must_use]
    pub fn is_pong(&self) -> bool {
        matches!(self, Self::Other(kind) if kind == "pong")
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => f.write_str("message"),
            Self::Subscribe => f.write_str("subscribe"),
            Self::Unsubscribe => f.write_str("unsubscribe"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

/// A frame received on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Frame kind.
    pub kind: MessageKind,
    /// Channel the frame belongs to.
    pub channel: String,
    /// Opaque payload.
    pub data: Bytes,
}

impl BusMessage {
    /// Creates a data message.
    #[must_use]
    pub fn message(channel: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            kind: MessageKind::Message,
            channel: channel.into(),
            data: data.into(),
        }
    }
}

// ============================================
// Traits
// ============================================

/// Publishes payloads on a channel.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `payload` on `channel`.
    ///
    /// # Returns
    /// Number of subscribers that received the message. Zero is not an
    /// error: publishing is fire-and-forget.
    ///
    /// # Errors
    /// Returns error if the bus is unreachable.
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<u64>;
}

/// Writes status flags read by other components.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Sets `key` to `value`.
    ///
    /// # Errors
    /// Returns error if the store is unreachable.
    async fn set_status(&self, key: &str, value: &str) -> Result<()>;
}

/// An active channel subscription.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next frame.
    ///
    /// # Returns
    /// `Ok(None)` once the subscription has ended.
    ///
    /// # Errors
    /// Returns error on transport failure.
    async fn next_message(&mut self) -> Result<Option<BusMessage>>;
}

/// A bus endpoint offering publishing, status keys and subscriptions.
///
/// # Example
/// ```ignore
/// async fn listen<B: MessageBus + ?Sized>(bus: &B) -> Result<()> {
///     let mut sub = bus.subscribe("hostcmd").await?;
///     bus.set_status("host_agent_ready", "true").await?;
///     while let Some(msg) = sub.next_message().await? {
///         handle(msg);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait MessageBus: Publisher + StatusStore {
    /// Subscribes to `channel`.
    ///
    /// Returns once the subscription is active.
    ///
    /// # Errors
    /// Returns error if the subscription cannot be established.
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_from_wire() {
        assert_eq!(MessageKind::from_wire("message"), MessageKind::Message);
        assert_eq!(MessageKind::from_wire("SUBSCRIBE"), MessageKind::Subscribe);
        assert!(MessageKind::from_wire("unsubscribe").is_confirmation());
        assert_eq!(
            MessageKind::from_wire("pmessage"),
            MessageKind::Other("pmessage".into())
        );
        assert_eq!(MessageKind::Other("pong".into()).to_string(), "pong");
        assert!(MessageKind::from_wire("PONG").is_pong());
        assert!(!MessageKind::Message.is_pong());
    }
}
