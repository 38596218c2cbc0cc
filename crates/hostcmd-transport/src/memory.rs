// ============================================
// File: crates/hostcmd-transport/src/memory.rs
// ============================================
//! # In-Memory Bus
//!
//! ## Creation Reason
//! Lets the agent loop, the control plane and their tests run without a
//! Redis server.
//!
//! ## Main Functionality
//! - Publish fan-out to subscribers of the same channel
//! - Raw frame injection (any kind, any channel) for filter tests
//! - Recorded status writes and published payloads
//! - `close()` ends every subscription cleanly
//!
//! ## Usage in Tests
//! ```ignore
//! use hostcmd_transport::memory::MemoryBus;
//! use hostcmd_transport::traits::{MessageBus, Publisher};
//!
//! let bus = MemoryBus::new();
//! let mut sub = bus.subscribe("hostcmd").await?;
//!
//! assert_eq!(bus.publish("hostcmd", b"payload").await?, 1);
//! let msg = sub.next_message().await?.unwrap();
//! assert_eq!(&msg.data[..], b"payload");
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - Clones share state; hand one clone to the code under test and keep
//!   another for assertions
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::error::{Result, TransportError};
use crate::traits::{BusMessage, MessageBus, Publisher, StatusStore, Subscription};

// ============================================
// MemoryBus
// ============================================

#[derive(Debug, Default)]
struct State {
    subscribers: Vec<(String, mpsc::UnboundedSender<BusMessage>)>,
    status: HashMap<String, String>,
    status_log: Vec<(String, String)>,
    published: Vec<(String, Bytes)>,
    closed: bool,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    subscriber_count: watch::Sender<usize>,
}

/// In-process [`MessageBus`].
#[derive(Debug, Clone)]
pub struct MemoryBus {
    inner: Arc<Inner>,
}

impl MemoryBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (subscriber_count, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                subscriber_count,
            }),
        }
    }

    /// Delivers a raw frame to every subscriber regardless of channel.
    ///
    /// Returns the number of subscribers reached.
    pub fn inject(&self, message: BusMessage) -> usize {
        let mut state = self.inner.state.lock();
        state
            .subscribers
            .retain(|(_, tx)| tx.send(message.clone()).is_ok());
        state.subscribers.len()
    }

    /// Ends all subscriptions; later subscribe calls fail.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        state.subscribers.clear();
        self.inner.subscriber_count.send_replace(0);
    }

    /// Waits until at least `count` subscriptions are active.
    pub async fn wait_for_subscribers(&self, count: usize) {
        let mut rx = self.inner.subscriber_count.subscribe();
        // The sender lives in `inner`, so the channel cannot close here
        let _ = rx.wait_for(|n| *n >= count).await;
    }

    /// Current value of a status key.
    #[must_use]
    pub fn status(&self, key: &str) -> Option<String> {
        self.inner.state.lock().status.get(key).cloned()
    }

    /// Every status write in order.
    #[must_use]
    pub fn status_log(&self) -> Vec<(String, String)> {
        self.inner.state.lock().status_log.clone()
    }

    /// Every published `(channel, payload)` in order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, Bytes)> {
        self.inner.state.lock().published.clone()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MemoryBus {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<u64> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(TransportError::ConnectionClosed);
        }

        let data = Bytes::copy_from_slice(payload);
        state.published.push((channel.to_owned(), data.clone()));

        let mut delivered = 0u64;
        state.subscribers.retain(|(subscribed, tx)| {
            if subscribed != channel {
                return true;
            }
            let ok = tx.send(BusMessage::message(channel, data.clone())).is_ok();
            if ok {
                delivered += 1;
            }
            ok
        });
        self.inner
            .subscriber_count
            .send_replace(state.subscribers.len());
        Ok(delivered)
    }
}

#[async_trait]
impl StatusStore for MemoryBus {
    async fn set_status(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(TransportError::ConnectionClosed);
        }
        state.status.insert(key.to_owned(), value.to_owned());
        state.status_log.push((key.to_owned(), value.to_owned()));
        Ok(())
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(TransportError::ConnectionClosed);
            }
            state.subscribers.push((channel.to_owned(), tx));
            self.inner
                .subscriber_count
                .send_replace(state.subscribers.len());
        }
        Ok(Box::new(MemorySubscription { rx }))
    }
}

// ============================================
// MemorySubscription
// ============================================

/// Receiving end of a [`MemoryBus`] subscription.
#[derive(Debug)]
pub struct MemorySubscription {
    rx: mpsc::UnboundedReceiver<BusMessage>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_message(&mut self) -> Result<Option<BusMessage>> {
        Ok(self.rx.recv().await)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MessageKind;

    #[tokio::test]
    async fn test_publish_fans_out_by_channel() {
        let bus = MemoryBus::new();
        let mut a = bus.subscribe("hostcmd").await.unwrap();
        let mut b = bus.subscribe("hostcmd").await.unwrap();
        let _other = bus.subscribe("viewer").await.unwrap();

        assert_eq!(bus.publish("hostcmd", b"x").await.unwrap(), 2);
        assert_eq!(&a.next_message().await.unwrap().unwrap().data[..], b"x");
        assert_eq!(&b.next_message().await.unwrap().unwrap().data[..], b"x");
        assert_eq!(bus.published().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let bus = MemoryBus::new();
        assert_eq!(bus.publish("hostcmd", b"x").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inject_raw_frames() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe("hostcmd").await.unwrap();

        let frame = BusMessage {
            kind: MessageKind::Other("pmessage".into()),
            channel: "elsewhere".into(),
            data: Bytes::from_static(b"?"),
        };
        assert_eq!(bus.inject(frame.clone()), 1);
        assert_eq!(sub.next_message().await.unwrap(), Some(frame));
    }

    #[tokio::test]
    async fn test_status_recorded() {
        let bus = MemoryBus::new();
        bus.set_status("ip_addresses_ready", "false").await.unwrap();
        bus.set_status("ip_addresses_ready", "true").await.unwrap();

        assert_eq!(bus.status("ip_addresses_ready").as_deref(), Some("true"));
        assert_eq!(bus.status_log().len(), 2);
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe("hostcmd").await.unwrap();
        bus.wait_for_subscribers(1).await;

        bus.close();
        assert!(sub.next_message().await.unwrap().is_none());
        assert!(bus.subscribe("hostcmd").await.is_err());
    }
}
