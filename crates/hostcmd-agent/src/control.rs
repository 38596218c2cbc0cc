// ============================================
// File: crates/hostcmd-agent/src/control.rs
// ============================================
//! # Control Plane Dispatcher
//!
//! ## Creation Reason
//! The sending side of the protocol. Whoever wants a device to reboot,
//! shut down or refresh its addresses goes through `ControlPlane::request`.
//!
//! ## Main Functionality
//! - Signs and publishes one envelope per request (fire-and-forget)
//! - On supervisor-managed devices, reboot and shutdown skip the bus and
//!   go straight to the supervisor with retries
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Published { receivers: 0 }` is not an error: nobody was listening,
//!   and the bus does not queue
//! - There is no acknowledgment from the agent
//!
//! ## Last Modified
//! v0.1.0 - Initial control plane

use std::sync::Arc;

use tracing::info;

use hostcmd_core::crypto::SharedSecret;
use hostcmd_core::signer::CommandSigner;
use hostcmd_transport::traits::Publisher;

use crate::config::{AgentConfig, ExecutionBackend};
use crate::error::{AgentError, Result};
use crate::services::retry::RetryPolicy;
use crate::services::supervisor::{request_with_retry, PowerAction, PowerBackend, SupervisorClient};

/// How a request left the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Published on the bus to `receivers` subscribers.
    Published {
        /// Subscribers reached
        receivers: u64,
    },
    /// Performed through the device supervisor.
    Supervisor(PowerAction),
}

/// Issues host commands.
pub struct ControlPlane {
    signer: CommandSigner,
    publisher: Arc<dyn Publisher>,
    channel: String,
    supervisor: Option<(Arc<dyn PowerBackend>, RetryPolicy)>,
}

impl ControlPlane {
    /// Creates a dispatcher publishing on `channel`.
    pub fn new(signer: CommandSigner, publisher: Arc<dyn Publisher>, channel: impl Into<String>) -> Self {
        Self {
            signer,
            publisher,
            channel: channel.into(),
            supervisor: None,
        }
    }

    /// Routes reboot and shutdown through `backend`.
    #[must_use]
    pub fn with_supervisor(mut self, backend: Arc<dyn PowerBackend>, policy: RetryPolicy) -> Self {
        self.supervisor = Some((backend, policy));
        self
    }

    /// Builds a dispatcher from configuration.
    ///
    /// # Errors
    /// Returns error if the supervisor backend is selected but unusable.
    pub fn from_config(
        config: &AgentConfig,
        secret: Option<Arc<SharedSecret>>,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self> {
        let plane = Self::new(CommandSigner::new(secret), publisher, config.bus.channel.clone());
        if config.execution.backend == ExecutionBackend::Supervisor {
            let client = SupervisorClient::from_config(&config.supervisor)?;
            return Ok(plane.with_supervisor(Arc::new(client), config.supervisor.retry_policy()));
        }
        Ok(plane)
    }

    /// Requests `cmd` on the device.
    ///
    /// # Errors
    /// Returns `RetriesExhausted` if the supervisor kept failing, or the
    /// signing/transport error if publishing failed.
    pub async fn request(&self, cmd: &str) -> Result<Delivery> {
        if let (Some((backend, policy)), Some(action)) =
            (&self.supervisor, PowerAction::from_command(cmd))
        {
            request_with_retry(backend.as_ref(), action, policy)
                .await
                .map_err(|e| AgentError::RetriesExhausted {
                    operation: format!("supervisor {action}"),
                    attempts: e.attempts,
                    last: e.last.to_string(),
                })?;
            return Ok(Delivery::Supervisor(action));
        }

        let payload = self.signer.sign_payload(cmd)?;
        let receivers = self.publisher.publish(&self.channel, &payload).await?;
        info!(cmd, channel = %self.channel, receivers, "Published host command");
        Ok(Delivery::Published { receivers })
    }
}

impl std::fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlane")
            .field("channel", &self.channel)
            .field("supervisor", &self.supervisor.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
