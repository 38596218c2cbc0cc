// ============================================
// File: crates/hostcmd-agent/src/config.rs
// ============================================
//! # Agent Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the host command agent and the
//! control-plane sender, supporting a TOML file plus environment overrides.
//!
//! ## Main Functionality
//! - `AgentConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Environment overrides (`apply_env`)
//! - Configuration validation
//!
//! ## Configuration Sections
//! - `bus`: Redis endpoint and channel
//! - `security`: Freshness window, nonce cache size
//! - `limits`: Cooldown for destructive commands
//! - `execution`: Dry run, timeouts, privileged backend
//! - `supervisor`: Device supervisor endpoint and retry policy
//! - `network`: Connectivity probe and interface filter
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [bus]
//! host = "redis"
//! port = 6379
//! channel = "hostcmd"
//! health_check_interval_secs = 30
//!
//! [security]
//! max_age_secs = 60
//! nonce_capacity = 2048
//!
//! [limits]
//! rate_limit_secs = 300
//!
//! [execution]
//! backend = "direct"
//! timeout_secs = 10
//! ```
//!
//! ## Environment Overrides
//! | Variable                     | Effect                              |
//! |------------------------------|-------------------------------------|
//! | `HOSTCMD_MAX_AGE_SECONDS`    | `security.max_age_secs`             |
//! | `HOSTCMD_RATE_LIMIT_SECONDS` | `limits.rate_limit_secs`            |
//! | `TESTING`                    | non-empty → `execution.dry_run`     |
//! | `REDIS_URL`                  | `bus.url`                           |
//! | `REDIS_HOST` / `REDIS_PORT`  | `bus.host` / `bus.port`             |
//! | `REDIS_DB` / `REDIS_PASSWORD`| `bus.db` / `bus.password`           |
//! | `BALENA`                     | non-empty → supervisor backend      |
//! | `BALENA_SUPERVISOR_ADDRESS`  | `supervisor.address`                |
//! | `BALENA_SUPERVISOR_API_KEY`  | `supervisor.api_key`                |
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require an agent restart
//! - The signing secret is NOT part of this file; it only comes from the
//!   environment
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation
//! v0.1.1 - Validate once after environment overrides

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use hostcmd_transport::redis::{RedisEndpoint, DEFAULT_REDIS_PORT};

use crate::error::{AgentError, Result};
use crate::services::retry::RetryPolicy;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hostcmd/agent.toml";

// ============================================
// AgentConfig
// ============================================

/// Main agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Message bus configuration.
    #[serde(default)]
    pub bus: BusConfig,

    /// Envelope validation settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Rate limiting.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Command execution.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Device supervisor.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Network refresh.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AgentConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read_file(path.as_ref()).await?;
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Reads and parses `path` without validating.
    async fn read_file(path: &Path) -> Result<Self> {
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AgentError::config_load(&path_str, e.to_string()))?;

        toml::from_str(&content).map_err(|e| AgentError::config_load(&path_str, e.to_string()))
    }

    /// Loads `path` if it exists, defaults otherwise, then applies the
    /// process environment and validates.
    ///
    /// # Errors
    /// Returns error if the file is invalid or an override cannot be parsed.
    pub async fn resolve(path: impl AsRef<Path>) -> Result<Self> {
        Self::resolve_with(path, |key| std::env::var(key).ok()).await
    }

    /// [`resolve`](Self::resolve) with an injectable environment lookup.
    ///
    /// Validation runs once, after the overrides, so the environment can
    /// complete a file that is not valid on its own.
    ///
    /// # Errors
    /// Returns error if the file is unreadable, the merged configuration is
    /// invalid, or an override cannot be parsed.
    pub async fn resolve_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::read_file(path).await?
        } else {
            info!("Config file {} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the string cannot be parsed or validated.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AgentError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if a numeric override does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HOSTCMD_MAX_AGE_SECONDS") {
            self.security.max_age_secs = parse_env("HOSTCMD_MAX_AGE_SECONDS", &v)?;
        }
        if let Some(v) = get("HOSTCMD_RATE_LIMIT_SECONDS") {
            self.limits.rate_limit_secs = parse_env("HOSTCMD_RATE_LIMIT_SECONDS", &v)?;
        }
        if get("TESTING").is_some() {
            self.execution.dry_run = true;
        }

        if let Some(v) = get("REDIS_URL") {
            self.bus.url = Some(v);
        }
        if let Some(v) = get("REDIS_HOST") {
            self.bus.host = v;
        }
        if let Some(v) = get("REDIS_PORT") {
            self.bus.port = parse_env("REDIS_PORT", &v)?;
        }
        if let Some(v) = get("REDIS_DB") {
            self.bus.db = parse_env("REDIS_DB", &v)?;
        }
        if let Some(v) = get("REDIS_PASSWORD") {
            self.bus.password = Some(v);
        }

        if get("BALENA").is_some() {
            self.execution.backend = ExecutionBackend::Supervisor;
        }
        if let Some(v) = get("BALENA_SUPERVISOR_ADDRESS") {
            self.supervisor.address = Some(v);
        }
        if let Some(v) = get("BALENA_SUPERVISOR_API_KEY") {
            self.supervisor.api_key = Some(v);
        }

        Ok(())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.bus.validate()?;
        self.security.validate()?;
        self.limits.validate()?;
        self.execution.validate()?;
        self.supervisor.validate(self.execution.backend)?;
        self.network.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string with credentials redacted.
    #[must_use]
    pub fn to_toml(&self) -> String {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]".to_string());
        let mut shown = self.clone();
        shown.bus.password = redact(&self.bus.password);
        shown.bus.url = redact(&self.bus.url);
        shown.supervisor.api_key = redact(&self.supervisor.api_key);
        toml::to_string_pretty(&shown).unwrap_or_default()
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| AgentError::config_invalid(key, e.to_string()))
}

fn require_positive(field: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(AgentError::config_invalid(field, "must be greater than 0"));
    }
    Ok(())
}

// ============================================
// BusConfig
// ============================================

/// Message bus configuration section.
#[derive(Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Redis host.
    #[serde(default = "default_bus_host")]
    pub host: String,

    /// Redis port.
    #[serde(default = "default_bus_port")]
    pub port: u16,

    /// Redis database index.
    #[serde(default)]
    pub db: u32,

    /// Redis password.
    #[serde(default)]
    pub password: Option<String>,

    /// Full `redis://` URL; overrides host, port, db and password.
    #[serde(default)]
    pub url: Option<String>,

    /// Channel carrying host commands.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// TCP connect timeout.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle time before the subscriber connection is checked with `PING`.
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,
}

fn default_bus_host() -> String {
    "redis".to_string()
}

fn default_bus_port() -> u16 {
    DEFAULT_REDIS_PORT
}

fn default_channel() -> String {
    "hostcmd".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_health_check_interval() -> u64 {
    30
}

impl BusConfig {
    fn validate(&self) -> Result<()> {
        if self.channel.is_empty() {
            return Err(AgentError::config_invalid("bus.channel", "cannot be empty"));
        }
        require_positive("bus.connect_timeout_secs", self.connect_timeout_secs)?;
        require_positive("bus.health_check_interval_secs", self.health_check_interval_secs)?;
        self.endpoint().map(|_| ())
    }

    /// Builds the Redis endpoint, preferring `url` when set.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` for an unparseable or non-`redis://` URL.
    pub fn endpoint(&self) -> Result<RedisEndpoint> {
        let timeout = Duration::from_secs(self.connect_timeout_secs);
        let health_check = Duration::from_secs(self.health_check_interval_secs);

        let Some(raw) = &self.url else {
            if self.host.is_empty() {
                return Err(AgentError::config_invalid("bus.host", "cannot be empty"));
            }
            return Ok(RedisEndpoint::new(&self.host, self.port)
                .with_db(self.db)
                .with_password(self.password.clone())
                .with_connect_timeout(timeout)
                .with_health_check_interval(health_check));
        };

        let url = reqwest::Url::parse(raw)
            .map_err(|e| AgentError::config_invalid("bus.url", e.to_string()))?;
        if url.scheme() != "redis" {
            return Err(AgentError::config_invalid(
                "bus.url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AgentError::config_invalid("bus.url", "missing host"))?;
        let port = url.port().unwrap_or(DEFAULT_REDIS_PORT);

        let db = match url.path().trim_start_matches('/') {
            "" => 0,
            path => path
                .parse()
                .map_err(|_| AgentError::config_invalid("bus.url", "database must be a number"))?,
        };

        Ok(RedisEndpoint::new(host, port)
            .with_db(db)
            .with_password(url.password().map(str::to_owned))
            .with_connect_timeout(timeout)
            .with_health_check_interval(health_check))
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: default_bus_host(),
            port: default_bus_port(),
            db: 0,
            password: None,
            url: None,
            channel: default_channel(),
            connect_timeout_secs: default_connect_timeout(),
            health_check_interval_secs: default_health_check_interval(),
        }
    }
}

impl fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("channel", &self.channel)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("health_check_interval_secs", &self.health_check_interval_secs)
            .finish()
    }
}

// ============================================
// SecurityConfig
// ============================================

/// Envelope validation section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Maximum `|now - ts|` in seconds.
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,

    /// Number of accepted nonces remembered.
    #[serde(default = "default_nonce_capacity")]
    pub nonce_capacity: usize,
}

fn default_max_age() -> u64 {
    hostcmd_core::validator::DEFAULT_MAX_AGE_SECS
}

fn default_nonce_capacity() -> usize {
    hostcmd_core::replay::DEFAULT_NONCE_CAPACITY
}

impl SecurityConfig {
    fn validate(&self) -> Result<()> {
        require_positive("security.max_age_secs", self.max_age_secs)?;
        if self.nonce_capacity == 0 {
            return Err(AgentError::config_invalid(
                "security.nonce_capacity",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age(),
            nonce_capacity: default_nonce_capacity(),
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Rate limiting section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Cooldown between two executions of the same limited command.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_secs: u64,

    /// Commands subject to the cooldown.
    #[serde(default = "default_rate_limited_commands")]
    pub rate_limited_commands: Vec<String>,
}

fn default_rate_limit() -> u64 {
    300
}

fn default_rate_limited_commands() -> Vec<String> {
    vec![
        hostcmd_common::types::REBOOT.to_string(),
        hostcmd_common::types::SHUTDOWN.to_string(),
    ]
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        require_positive("limits.rate_limit_secs", self.rate_limit_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit_secs: default_rate_limit(),
            rate_limited_commands: default_rate_limited_commands(),
        }
    }
}

// ============================================
// ExecutionConfig
// ============================================

/// Where reboot and shutdown requests go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionBackend {
    /// `sudo systemctl` on the host.
    #[default]
    Direct,
    /// HTTP call to the device supervisor.
    Supervisor,
}

/// Command execution section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Log would-be actions instead of performing them.
    #[serde(default)]
    pub dry_run: bool,

    /// Timeout for OS invocations.
    #[serde(default = "default_exec_timeout")]
    pub timeout_secs: u64,

    /// Bytes of stdout/stderr kept in logs.
    #[serde(default = "default_output_limit")]
    pub output_limit: usize,

    /// Privileged backend.
    #[serde(default)]
    pub backend: ExecutionBackend,
}

fn default_exec_timeout() -> u64 {
    10
}

fn default_output_limit() -> usize {
    500
}

impl ExecutionConfig {
    fn validate(&self) -> Result<()> {
        require_positive("execution.timeout_secs", self.timeout_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            timeout_secs: default_exec_timeout(),
            output_limit: default_output_limit(),
            backend: ExecutionBackend::default(),
        }
    }
}

// ============================================
// SupervisorConfig
// ============================================

/// Device supervisor section.
#[derive(Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Base URL, e.g. `http://127.0.0.1:48484`.
    #[serde(default)]
    pub address: Option<String>,

    /// API key sent as the `apikey` query parameter.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Attempts per request.
    #[serde(default = "default_supervisor_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_supervisor_attempts() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    1
}

fn default_request_timeout() -> u64 {
    10
}

impl SupervisorConfig {
    /// Retry policy for supervisor requests.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.retry_delay_secs))
    }

    fn validate(&self, backend: ExecutionBackend) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(AgentError::config_invalid(
                "supervisor.max_attempts",
                "must be greater than 0",
            ));
        }
        require_positive("supervisor.request_timeout_secs", self.request_timeout_secs)?;

        if backend == ExecutionBackend::Supervisor {
            let address = self
                .address
                .as_deref()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| AgentError::config_missing("supervisor.address"))?;
            reqwest::Url::parse(address)
                .map_err(|e| AgentError::config_invalid("supervisor.address", e.to_string()))?;
        }
        Ok(())
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            address: None,
            api_key: None,
            max_attempts: default_supervisor_attempts(),
            retry_delay_secs: default_retry_delay(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl fmt::Debug for SupervisorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorConfig")
            .field("address", &self.address)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network refresh section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// URL fetched to decide whether the Internet is reachable.
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Probe attempts.
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,

    /// Fixed delay between probe attempts.
    #[serde(default = "default_retry_delay")]
    pub probe_delay_secs: u64,

    /// Interface name prefixes whose addresses are reported.
    #[serde(default = "default_interface_prefixes")]
    pub interface_prefixes: Vec<String>,
}

fn default_probe_url() -> String {
    "https://1.1.1.1".to_string()
}

fn default_probe_attempts() -> u32 {
    10
}

fn default_interface_prefixes() -> Vec<String> {
    ["wlan", "eth", "wlp", "enp", "eno"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl NetworkConfig {
    /// Retry policy for the connectivity probe.
    #[must_use]
    pub const fn probe_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.probe_attempts, Duration::from_secs(self.probe_delay_secs))
    }

    fn validate(&self) -> Result<()> {
        if self.probe_attempts == 0 {
            return Err(AgentError::config_invalid(
                "network.probe_attempts",
                "must be greater than 0",
            ));
        }
        reqwest::Url::parse(&self.probe_url)
            .map_err(|e| AgentError::config_invalid("network.probe_url", e.to_string()))?;
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_url: default_probe_url(),
            probe_attempts: default_probe_attempts(),
            probe_delay_secs: default_retry_delay(),
            interface_prefixes: default_interface_prefixes(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================
