// ============================================
// File: crates/hostcmd-agent/src/services/rate_limit.rs
// ============================================
//! # Rate Limiter
//!
//! ## Creation Reason
//! Even a perfectly authenticated control plane can misbehave. A cooldown
//! on reboot and shutdown keeps a device from being power-cycled in a loop.
//!
//! ## Main Functionality
//! - `RateLimiter::allow`: cooldown check and bookkeeping in one step
//!
//! ## Decision Table
//! ```text
//! command not limited            → allow, table untouched
//! never run before               → allow, record now
//! now - last_run <  window       → deny,  table untouched
//! now - last_run >= window       → allow, record now
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only call this for commands that already passed validation;
//!   otherwise forged messages could consume the cooldown
//! - A clock that steps backwards keeps the command denied until it
//!   catches up
//!
//! ## Last Modified
//! v0.1.0 - Initial rate limiter

use std::collections::{HashMap, HashSet};

use tracing::warn;

use hostcmd_common::time::Timestamp;
use hostcmd_common::types::CommandName;

/// Per-command cooldown tracker.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window_secs: u64,
    limited: HashSet<String>,
    last_run: HashMap<String, Timestamp>,
}

impl RateLimiter {
    /// Creates a limiter applying `window_secs` to each of `commands`.
    pub fn new<I, S>(window_secs: u64, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            window_secs,
            limited: commands.into_iter().map(Into::into).collect(),
            last_run: HashMap::new(),
        }
    }

    /// Returns `true` if `cmd` is subject to the cooldown.
    #[must_use]
    pub fn is_limited(&self, cmd: &str) -> bool {
        self.limited.contains(cmd)
    }

    /// Decides whether `cmd` may run at `now`, recording it if so.
    pub fn allow(&mut self, cmd: &CommandName, now: Timestamp) -> bool {
        if !self.is_limited(cmd.as_str()) {
            return true;
        }

        if let Some(last) = self.last_run.get(cmd.as_str()) {
            let elapsed = now.seconds_since(*last);
            if elapsed < 0 || elapsed.unsigned_abs() < self.window_secs {
                warn!(
                    cmd = %cmd,
                    last = %last,
                    window = self.window_secs,
                    "Rate limit reject for host command"
                );
                return false;
            }
        }

        self.last_run.insert(cmd.as_str().to_owned(), now);
        true
    }

    /// Last accepted run of `cmd`, if any.
    #[must_use]
    pub fn last_run(&self, cmd: &str) -> Option<Timestamp> {
        self.last_run.get(cmd).copied()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(300, ["reboot", "shutdown"])
    }

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    #[test]
    fn test_second_reboot_inside_window_denied() {
        let mut rl = limiter();
        let reboot = CommandName::new("reboot");

        assert!(rl.allow(&reboot, at(1_000)));
        assert!(!rl.allow(&reboot, at(1_299)));
        // Denials do not extend the window
        assert_eq!(rl.last_run("reboot"), Some(at(1_000)));
        assert!(rl.allow(&reboot, at(1_300)));
    }

    #[test]
    fn test_commands_tracked_independently() {
        let mut rl = limiter();
        assert!(rl.allow(&CommandName::new("reboot"), at(1_000)));
        assert!(rl.allow(&CommandName::new("shutdown"), at(1_001)));
    }

    #[test]
    fn test_unlimited_commands_untouched() {
        let mut rl = limiter();
        let refresh = CommandName::new("set_ip_addresses");

        assert!(rl.allow(&refresh, at(1)));
        assert!(rl.allow(&refresh, at(1)));
        assert!(rl.last_run("set_ip_addresses").is_none());
    }

    #[test]
    fn test_clock_going_backwards_denies() {
        let mut rl = limiter();
        let reboot = CommandName::new("reboot");
        assert!(rl.allow(&reboot, at(5_000)));
        assert!(!rl.allow(&reboot, at(100)));
    }
}
