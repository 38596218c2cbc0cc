// ============================================
// File: crates/hostcmd-agent/src/services/supervisor.rs
// ============================================
//! # Device Supervisor Client
//!
//! ## Creation Reason
//! On supervisor-managed devices the agent container has no systemd to
//! talk to. Reboot and shutdown go through the supervisor's HTTP API
//! instead.
//!
//! ## Main Functionality
//! - `PowerAction`: reboot or shutdown
//! - `PowerBackend`: trait seam for anything that can perform one
//! - `SupervisorClient`: `POST {address}/v1/{action}?apikey={key}`
//! - `request_with_retry`: applies a `RetryPolicy` to a backend
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never log the request URL; it carries the API key
//! - A non-2xx response is an error and is retried like a transport error
//!
//! ## Last Modified
//! v0.1.0 - Initial supervisor client

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use hostcmd_common::types::{REBOOT, SHUTDOWN};

use super::retry::{retry, RetryError, RetryPolicy};
use crate::config::SupervisorConfig;
use crate::error::{AgentError, Result};

// ============================================
// PowerAction
// ============================================

/// A power-state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerAction {
    /// Restart the device.
    Reboot,
    /// Power the device off.
    Shutdown,
}

impl PowerAction {
    /// Maps a command name.
    #[must_use]
    pub fn from_command(cmd: &str) -> Option<Self> {
        match cmd {
            REBOOT => Some(Self::Reboot),
            SHUTDOWN => Some(Self::Shutdown),
            _ => None,
        }
    }

    /// Supervisor API path.
    #[must_use]
    pub const fn api_path(&self) -> &'static str {
        match self {
            Self::Reboot => "/v1/reboot",
            Self::Shutdown => "/v1/shutdown",
        }
    }

    /// Command name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reboot => REBOOT,
            Self::Shutdown => SHUTDOWN,
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// PowerBackend
// ============================================

/// Something that can reboot or shut down the device.
#[async_trait]
pub trait PowerBackend: Send + Sync + fmt::Debug {
    /// Performs one attempt of `action`.
    ///
    /// # Errors
    /// Returns error if the request failed or was refused.
    async fn request(&self, action: PowerAction) -> Result<()>;
}

/// Runs `action` against `backend` under `policy`.
///
/// # Errors
/// Returns `RetryError` with the last failure once the policy is exhausted.
pub async fn request_with_retry(
    backend: &dyn PowerBackend,
    action: PowerAction,
    policy: &RetryPolicy,
) -> std::result::Result<(), RetryError<AgentError>> {
    let result = retry(policy, action.as_str(), |_| backend.request(action)).await;
    if let Err(e) = &result {
        error!(action = %action, attempts = e.attempts, error = %e.last, "Supervisor request failed");
    }
    result
}

// ============================================
// SupervisorClient
// ============================================

/// HTTP client for the device supervisor.
pub struct SupervisorClient {
    http: Client,
    address: String,
    api_key: String,
}

impl SupervisorClient {
    /// Creates a client for `address` with `api_key`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(address: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::startup_failed(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            address: address.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        })
    }

    /// Creates a client from the `[supervisor]` section.
    ///
    /// # Errors
    /// Returns `ConfigMissing` if no address is configured.
    pub fn from_config(config: &SupervisorConfig) -> Result<Self> {
        let address = config
            .address
            .clone()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| AgentError::config_missing("supervisor.address"))?;
        Self::new(
            address,
            config.api_key.clone().unwrap_or_default(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Endpoint for `action` without the API key.
    #[must_use]
    pub fn endpoint(&self, action: PowerAction) -> String {
        format!("{}{}", self.address, action.api_path())
    }
}

#[async_trait]
impl PowerBackend for SupervisorClient {
    async fn request(&self, action: PowerAction) -> Result<()> {
        debug!(action = %action, endpoint = %self.endpoint(action), "Calling supervisor");

        let response = self
            .http
            .post(self.endpoint(action))
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| AgentError::SupervisorRequest {
                action: action.to_string(),
                // Strip the URL so the API key stays out of the logs
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::SupervisorStatus {
                action: action.to_string(),
                status: status.as_u16(),
            });
        }

        info!(action = %action, "Supervisor accepted request");
        Ok(())
    }
}

impl fmt::Debug for SupervisorClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorClient")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Debug, Default)]
    struct FlakyBackend {
        failures_left: Mutex<u32>,
        calls: Mutex<Vec<PowerAction>>,
    }

    #[async_trait]
    impl PowerBackend for FlakyBackend {
        async fn request(&self, action: PowerAction) -> Result<()> {
            self.calls.lock().push(action);
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(AgentError::SupervisorStatus {
                    action: action.to_string(),
                    status: 503,
                });
            }
            Ok(())
        }
    }

    const FAST: RetryPolicy = RetryPolicy::new(5, Duration::from_millis(1));

    #[test]
    fn test_action_mapping() {
        assert_eq!(PowerAction::from_command("reboot"), Some(PowerAction::Reboot));
        assert_eq!(PowerAction::from_command("shutdown"), Some(PowerAction::Shutdown));
        assert_eq!(PowerAction::from_command("set_ip_addresses"), None);
        assert_eq!(PowerAction::Shutdown.api_path(), "/v1/shutdown");
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let backend = FlakyBackend {
            failures_left: Mutex::new(3),
            ..FlakyBackend::default()
        };
        request_with_retry(&backend, PowerAction::Reboot, &FAST)
            .await
            .unwrap();
        assert_eq!(backend.calls.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_retry_exhaustion() {
        let backend = FlakyBackend {
            failures_left: Mutex::new(u32::MAX),
            ..FlakyBackend::default()
        };
        let err = request_with_retry(&backend, PowerAction::Shutdown, &FAST)
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 5);
        assert!(matches!(err.last, AgentError::SupervisorStatus { status: 503, .. }));
    }

    /// Serves a single HTTP request, returning its request line.
    async fn one_shot_http(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            request.lines().next().unwrap_or_default().to_string()
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_client_posts_with_api_key() {
        let (addr, server) = one_shot_http("HTTP/1.1 200 OK").await;
        let client = SupervisorClient::new(format!("{addr}/"), "k3y", Duration::from_secs(5)).unwrap();

        client.request(PowerAction::Reboot).await.unwrap();
        assert_eq!(server.await.unwrap(), "POST /v1/reboot?apikey=k3y HTTP/1.1");
    }

    #[tokio::test]
    async fn test_client_non_success_is_error() {
        let (addr, server) = one_shot_http("HTTP/1.1 401 Unauthorized").await;
        let client = SupervisorClient::new(addr, "bad", Duration::from_secs(5)).unwrap();

        let err = client.request(PowerAction::Shutdown).await.unwrap_err();
        assert!(matches!(err, AgentError::SupervisorStatus { status: 401, .. }));
        assert!(!err.is_retryable());
        server.await.unwrap();
    }
}
