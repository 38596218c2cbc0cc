// ============================================
// File: crates/hostcmd-agent/src/agent.rs
// ============================================
//! # Agent Orchestrator
//!
//! ## Creation Reason
//! Wires configuration, secret, bus and services into a running
//! subscriber and manages its lifecycle.
//!
//! ## Main Functionality
//! - `Agent::from_config`: builds every component from `AgentConfig`
//! - `Agent::run`: subscribe, announce readiness, process until stopped
//! - `Agent::shutdown`: programmatic stop
//!
//! ## Lifecycle
//! ```text
//! subscribe(channel)
//!    │
//!    ▼
//! SET host_agent_ready true
//!    │
//!    ▼
//! ┌──────────────────── loop ─────────────────────┐
//! │ select!                                       │
//! │   shutdown signal      → return Ok            │
//! │   next_message Ok(msg) → handler.process(msg) │
//! │   next_message None    → ConnectionClosed     │
//! │   next_message Err(e)  → return Err(e)        │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Messages are processed one at a time in delivery order. A long
//!   command (bounded by its timeout) delays the next message
//! - Transport failures end `run()`; the process supervisor restarts us
//!
//! ## Last Modified
//! v0.1.0 - Initial agent implementation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use hostcmd_core::crypto::SharedSecret;
use hostcmd_core::replay::NonceCache;
use hostcmd_core::validator::{CommandValidator, ValidatorConfig};
use hostcmd_transport::error::TransportError;
use hostcmd_transport::traits::{MessageBus, StatusStore};

use crate::config::{AgentConfig, ExecutionBackend};
use crate::error::Result;
use crate::handlers::MessageHandler;
use crate::services::executor::{CommandExecutor, PrivilegedBackend, SystemRunner};
use crate::services::network::{HttpProbe, NetworkRefresher, SystemInterfaces};
use crate::services::rate_limit::RateLimiter;
use crate::services::supervisor::SupervisorClient;

/// Status key set once the agent is subscribed.
pub const HOST_AGENT_READY_KEY: &str = "host_agent_ready";

// ============================================
// Agent
// ============================================

/// Host command agent.
///
/// # Lifecycle
/// 1. Create with `Agent::from_config(...)` or `Agent::new(...)`
/// 2. Start with `agent.run().await`
/// 3. Stop via `agent.shutdown()` or a transport failure
pub struct Agent {
    /// Message bus.
    bus: Arc<dyn MessageBus>,
    /// Processing chain.
    handler: Arc<MessageHandler>,
    /// Shutdown flag.
    shutdown: Arc<AtomicBool>,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
}

impl Agent {
    /// Creates an agent from prepared parts.
    pub fn new(bus: Arc<dyn MessageBus>, handler: MessageHandler) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            bus,
            handler: Arc::new(handler),
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Builds the full agent from configuration.
    ///
    /// # Errors
    /// Returns error if a backend cannot be constructed.
    pub fn from_config<B>(
        config: &AgentConfig,
        secret: Option<Arc<SharedSecret>>,
        bus: Arc<B>,
    ) -> Result<Self>
    where
        B: MessageBus + 'static,
    {
        let status: Arc<dyn StatusStore> = bus.clone();
        let bus: Arc<dyn MessageBus> = bus;

        let validator = CommandValidator::new(
            secret,
            ValidatorConfig {
                max_age_secs: config.security.max_age_secs,
            },
        );
        let nonces = NonceCache::with_capacity(config.security.nonce_capacity);
        let limiter = RateLimiter::new(
            config.limits.rate_limit_secs,
            config.limits.rate_limited_commands.iter().cloned(),
        );
        let executor = build_executor(config, status)?;

        info!(
            channel = %config.bus.channel,
            backend = ?config.execution.backend,
            dry_run = executor.is_dry_run(),
            max_age_secs = config.security.max_age_secs,
            rate_limit_secs = config.limits.rate_limit_secs,
            "Agent configured"
        );

        let handler = MessageHandler::new(
            config.bus.channel.clone(),
            validator,
            nonces,
            limiter,
            executor,
        );
        Ok(Self::new(bus, handler))
    }

    /// The processing chain.
    #[must_use]
    pub fn handler(&self) -> &MessageHandler {
        &self.handler
    }

    /// Runs until shutdown or transport failure.
    ///
    /// # Errors
    /// Returns the transport error that ended the subscription.
    pub async fn run(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let channel = self.handler.channel().to_owned();

        info!(channel = %channel, "Connecting to message bus");
        let mut subscription = self.bus.subscribe(&channel).await?;
        self.bus.set_status(HOST_AGENT_READY_KEY, "true").await?;
        info!(channel = %channel, "Subscribed, ready to process messages");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Agent received shutdown signal");
                    break;
                }
                next = subscription.next_message() => {
                    match next {
                        Ok(Some(message)) => {
                            let disposition = self.handler.process(&message).await;
                            debug!(?disposition, "Message processed");
                        }
                        Ok(None) => {
                            warn!("Subscription closed by the bus");
                            return Err(TransportError::ConnectionClosed.into());
                        }
                        Err(e) => {
                            warn!(error = %e, "Subscription failed");
                            return Err(e.into());
                        }
                    }
                }
            }
        }

        info!("Agent stopped");
        Ok(())
    }

    /// Triggers shutdown programmatically.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }

    /// Returns `true` once shutdown was requested.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("handler", &self.handler)
            .field("shutdown", &self.shutdown.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn build_executor(config: &AgentConfig, status: Arc<dyn StatusStore>) -> Result<CommandExecutor> {
    let backend = match config.execution.backend {
        ExecutionBackend::Direct => PrivilegedBackend::Direct(Arc::new(SystemRunner)),
        ExecutionBackend::Supervisor => PrivilegedBackend::Supervisor {
            backend: Arc::new(SupervisorClient::from_config(&config.supervisor)?),
            policy: config.supervisor.retry_policy(),
        },
    };

    let probe = HttpProbe::new(
        config.network.probe_url.clone(),
        Duration::from_secs(config.execution.timeout_secs),
    )?;
    let network = NetworkRefresher::new(
        status,
        Arc::new(probe),
        Arc::new(SystemInterfaces),
        config.network.probe_policy(),
        config.network.interface_prefixes.clone(),
    );

    Ok(CommandExecutor::new(backend, Arc::new(network))
        .with_dry_run(config.execution.dry_run)
        .with_timeout(Duration::from_secs(config.execution.timeout_secs))
        .with_output_limit(config.execution.output_limit))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    use hostcmd_core::signer::CommandSigner;
    use hostcmd_transport::memory::MemoryBus;
    use hostcmd_transport::traits::Publisher;

    use crate::error::AgentError;

    fn dry_run_config() -> AgentConfig {
        let mut config = AgentConfig::default();
        config.execution.dry_run = true;
        config
    }

    fn secret() -> Arc<SharedSecret> {
        Arc::new(SharedSecret::new("agent-secret").unwrap())
    }

    #[tokio::test]
    async fn test_run_announces_readiness_and_stops_on_shutdown() {
        let bus = MemoryBus::new();
        let agent = Arc::new(
            Agent::from_config(&dry_run_config(), Some(secret()), Arc::new(bus.clone())).unwrap(),
        );

        let runner = Arc::clone(&agent);
        let task = tokio::spawn(async move { runner.run().await });

        bus.wait_for_subscribers(1).await;
        while bus.status(HOST_AGENT_READY_KEY).is_none() {
            tokio::task::yield_now().await;
        }
        assert_eq!(bus.status(HOST_AGENT_READY_KEY).as_deref(), Some("true"));

        let signer = CommandSigner::new(Some(secret()));
        let payload = signer.sign_payload("reboot").unwrap();
        assert_eq!(bus.publish("hostcmd", &payload).await.unwrap(), 1);

        agent.shutdown();
        task.await.unwrap().unwrap();
        assert!(agent.is_shutting_down());
    }

    #[tokio::test]
    async fn test_closed_bus_ends_run_with_error() {
        let bus = MemoryBus::new();
        let agent = Arc::new(
            Agent::from_config(&dry_run_config(), Some(secret()), Arc::new(bus.clone())).unwrap(),
        );

        let runner = Arc::clone(&agent);
        let task = tokio::spawn(async move { runner.run().await });

        bus.wait_for_subscribers(1).await;
        bus.close();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, AgentError::Transport(TransportError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_supervisor_backend_requires_address() {
        let mut config = AgentConfig::default();
        config.execution.backend = ExecutionBackend::Supervisor;

        let err = Agent::from_config(&config, None, Arc::new(MemoryBus::new())).unwrap_err();
        assert!(err.is_config_error());
    }
}
