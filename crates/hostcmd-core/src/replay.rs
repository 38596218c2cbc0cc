// ============================================
// File: crates/hostcmd-core/src/replay.rs
// ============================================
//! # Nonce Cache
//!
//! ## Creation Reason
//! A valid envelope captured off the bus could be re-published within its
//! freshness window. Remembering accepted nonces turns that into a no-op.
//!
//! ## Main Functionality
//! - `NonceCache`: bounded set of accepted nonces with FIFO eviction
//!
//! ## Data Structure
//! ```text
//! order:   [n0, n1, n2, ... n(cap-1)]   ◄── push_back on accept
//!            │
//!            └── pop_front when len > capacity (also removed from set)
//! members: { n0, n1, ... }              ◄── O(1) membership test
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The cache is not persisted; a restarted agent starts empty
//! - Eviction is by count, not age. Size the capacity above the peak
//!   number of commands accepted in two freshness windows
//! - Not internally synchronized. Callers wrap it in a mutex so that
//!   check-then-insert is atomic
//!
//! ## Last Modified
//! v0.1.0 - Initial nonce cache

use std::collections::{HashSet, VecDeque};

/// Default number of nonces retained.
pub const DEFAULT_NONCE_CAPACITY: usize = 2048;

/// Bounded FIFO set of recently accepted nonces.
///
/// # Example
/// ```
/// use hostcmd_core::replay::NonceCache;
///
/// let mut cache = NonceCache::with_capacity(2);
/// cache.insert("a");
/// cache.insert("b");
/// cache.insert("c");
/// assert!(!cache.contains("a"));
/// assert!(cache.contains("c"));
/// assert_eq!(cache.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct NonceCache {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl NonceCache {
    /// Creates a cache with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_NONCE_CAPACITY)
    }

    /// Creates a cache holding at most `capacity` nonces (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Returns `true` if `nonce` was accepted and not yet evicted.
    #[must_use]
    pub fn contains(&self, nonce: &str) -> bool {
        self.members.contains(nonce)
    }

    /// Records `nonce`, evicting the oldest entries past capacity.
    ///
    /// Returns `false` if the nonce was already present (nothing changes).
    pub fn insert(&mut self, nonce: impl Into<String>) -> bool {
        let nonce = nonce.into();
        if self.members.contains(&nonce) {
            return false;
        }

        self.members.insert(nonce.clone());
        self.order.push_back(nonce);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        true
    }

    /// Number of nonces currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no nonce is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum number of nonces held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for NonceCache {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================
// Tests
// ============================================
