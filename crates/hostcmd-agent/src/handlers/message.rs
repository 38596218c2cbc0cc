// ============================================
// File: crates/hostcmd-agent/src/handlers/message.rs
// ============================================
//! # Command Message Handler
//!
//! ## Creation Reason
//! Owns the agent's mutable security state (nonce cache and cooldown
//! table) and runs each inbound message through the full chain.
//!
//! ## Main Functionality
//! - `MessageHandler::process`: one message in, one `Disposition` out
//!
//! ## ⚠️ Important Note for Next Developer
//! - The nonce lock is held only for the synchronous validation; the
//!   check-then-insert on the cache happens entirely under it
//! - The cooldown is consulted only after validation succeeded
//! - Locks are never held across an `.await`
//!
//! ## Last Modified
//! v0.1.0 - Initial message handler

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use hostcmd_common::time::{Clock, SystemClock};
use hostcmd_common::types::CommandName;
use hostcmd_core::replay::NonceCache;
use hostcmd_core::validator::CommandValidator;
use hostcmd_transport::traits::{BusMessage, MessageKind};

use crate::services::executor::{CommandExecutor, ExecutionOutcome};
use crate::services::rate_limit::RateLimiter;

/// What happened to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Wrong type or channel.
    Ignored,
    /// Failed validation.
    Rejected {
        /// Stable rejection label
        reason: &'static str,
    },
    /// Authentic but inside the cooldown.
    RateLimited(CommandName),
    /// Handed to the executor.
    Dispatched(ExecutionOutcome),
}

/// Processes command-channel messages.
#[derive(Debug)]
pub struct MessageHandler {
    channel: String,
    validator: CommandValidator,
    nonces: Mutex<NonceCache>,
    rate_limiter: Mutex<RateLimiter>,
    executor: CommandExecutor,
    clock: Arc<dyn Clock>,
}

impl MessageHandler {
    /// Creates a handler for `channel`.
    pub fn new(
        channel: impl Into<String>,
        validator: CommandValidator,
        nonces: NonceCache,
        rate_limiter: RateLimiter,
        executor: CommandExecutor,
    ) -> Self {
        Self {
            channel: channel.into(),
            validator,
            nonces: Mutex::new(nonces),
            rate_limiter: Mutex::new(rate_limiter),
            executor,
            clock: Arc::new(SystemClock),
        }
    }

    /// Uses `clock` for the cooldown.
    ///
    /// Give the validator the same clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Channel this handler accepts.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Number of nonces currently remembered.
    #[must_use]
    pub fn remembered_nonces(&self) -> usize {
        self.nonces.lock().len()
    }

    /// Runs `message` through filter, validator, cooldown and executor.
    pub async fn process(&self, message: &BusMessage) -> Disposition {
        if message.kind != MessageKind::Message || message.channel != self.channel {
            info!(
                kind = %message.kind,
                channel = %message.channel,
                "Received unsolicited message"
            );
            return Disposition::Ignored;
        }

        let checked = {
            let mut nonces = self.nonces.lock();
            self.validator.check(&message.data, &mut nonces)
        };

        let cmd = match checked {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!(
                    reason = e.reason(),
                    suspicious = e.is_suspicious(),
                    error = %e,
                    "Rejected host command"
                );
                return Disposition::Rejected { reason: e.reason() };
            }
        };
        debug!(cmd = %cmd, "Host command authenticated");

        let allowed = self.rate_limiter.lock().allow(&cmd, self.clock.now());
        if !allowed {
            return Disposition::RateLimited(cmd);
        }

        Disposition::Dispatched(self.executor.execute(&cmd).await)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use hostcmd_common::time::{ManualClock, Timestamp};
    use hostcmd_core::crypto::SharedSecret;
    use hostcmd_core::signer::CommandSigner;
    use hostcmd_core::validator::ValidatorConfig;

    use crate::error::Result;
    use crate::services::executor::{
        CommandRunner, ExecutionState, HostAction, PrivilegedBackend, RunResult,
    };
    use crate::services::network::NetworkRefresh;

    const T0: i64 = 1_700_000_000;

    #[derive(Debug, Default)]
    struct CountingRunner(Mutex<u32>);

    #[async_trait]
    impl CommandRunner for CountingRunner {
        async fn run(&self, _argv: &[&str], _timeout: Duration) -> RunResult {
            *self.0.lock() += 1;
            RunResult::Exited {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    #[derive(Debug)]
    struct NoNetwork;

    #[async_trait]
    impl NetworkRefresh for NoNetwork {
        async fn refresh(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        handler: MessageHandler,
        signer: CommandSigner,
        clock: Arc<ManualClock>,
        runner: Arc<CountingRunner>,
    }

    fn fixture() -> Fixture {
        let secret = Arc::new(SharedSecret::new("handler-secret").unwrap());
        let clock = Arc::new(ManualClock::new(T0));
        let runner = Arc::new(CountingRunner::default());

        let validator = CommandValidator::with_clock(
            Some(secret.clone()),
            ValidatorConfig::default(),
            clock.clone(),
        );
        let executor = CommandExecutor::new(
            PrivilegedBackend::Direct(runner.clone()),
            Arc::new(NoNetwork),
        );
        let handler = MessageHandler::new(
            "hostcmd",
            validator,
            NonceCache::new(),
            RateLimiter::new(300, ["reboot", "shutdown"]),
            executor,
        )
        .with_clock(clock.clone());

        Fixture {
            handler,
            signer: CommandSigner::with_clock(Some(secret), clock.clone()),
            clock,
            runner,
        }
    }

    fn message(fx: &Fixture, cmd: &str) -> BusMessage {
        BusMessage::message("hostcmd", fx.signer.sign_payload(cmd).unwrap())
    }

    #[tokio::test]
    async fn test_valid_command_is_dispatched() {
        let fx = fixture();
        let disposition = fx.handler.process(&message(&fx, "reboot")).await;

        assert!(matches!(
            disposition,
            Disposition::Dispatched(ExecutionOutcome::Finished(ref e))
                if e.action == HostAction::Reboot && e.state == ExecutionState::Succeeded
        ));
        assert_eq!(*fx.runner.0.lock(), 1);
        assert_eq!(fx.handler.remembered_nonces(), 1);
    }

    #[tokio::test]
    async fn test_other_channel_and_kind_are_ignored() {
        let fx = fixture();
        let payload = fx.signer.sign_payload("reboot").unwrap();

        let wrong_channel = BusMessage::message("other", payload.clone());
        assert_eq!(fx.handler.process(&wrong_channel).await, Disposition::Ignored);

        let confirmation = BusMessage {
            kind: MessageKind::Subscribe,
            channel: "hostcmd".into(),
            data: payload.into(),
        };
        assert_eq!(fx.handler.process(&confirmation).await, Disposition::Ignored);
        assert_eq!(fx.handler.remembered_nonces(), 0);
    }

    #[tokio::test]
    async fn test_cooldown_applies_to_fresh_envelopes() {
        let fx = fixture();
        fx.handler.process(&message(&fx, "reboot")).await;

        fx.clock.advance(120);
        assert_eq!(
            fx.handler.process(&message(&fx, "reboot")).await,
            Disposition::RateLimited("reboot".into())
        );

        fx.clock.advance(180);
        assert!(matches!(
            fx.handler.process(&message(&fx, "reboot")).await,
            Disposition::Dispatched(_)
        ));
        assert_eq!(*fx.runner.0.lock(), 2);
    }

    #[tokio::test]
    async fn test_rejected_traffic_does_not_consume_cooldown() {
        let fx = fixture();
        let forged = CommandSigner::with_clock(
            SharedSecret::new("wrong").map(Arc::new),
            fx.clock.clone(),
        );
        let bad = BusMessage::message("hostcmd", forged.sign_payload("reboot").unwrap());

        assert_eq!(
            fx.handler.process(&bad).await,
            Disposition::Rejected {
                reason: "invalid_signature"
            }
        );
        assert!(matches!(
            fx.handler.process(&message(&fx, "reboot")).await,
            Disposition::Dispatched(_)
        ));
    }

    #[tokio::test]
    async fn test_stale_envelope_rejected() {
        let fx = fixture();
        let old = fx
            .signer
            .sign_at("shutdown", Timestamp::from_secs(T0 - 3_600))
            .unwrap();
        let raw = hostcmd_core::protocol::encode_envelope(&old).unwrap();

        assert_eq!(
            fx.handler.process(&BusMessage::message("hostcmd", raw)).await,
            Disposition::Rejected { reason: "stale" }
        );
        assert_eq!(*fx.runner.0.lock(), 0);
    }
}
