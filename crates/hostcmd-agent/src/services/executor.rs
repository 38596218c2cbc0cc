// ============================================
// File: crates/hostcmd-agent/src/services/executor.rs
// ============================================
//! # Command Executor
//!
//! ## Creation Reason
//! Turns an authenticated, rate-limited command name into an action on the
//! host. The set of possible actions is a closed whitelist.
//!
//! ## Main Functionality
//! - `HostAction`: the whitelist
//! - `Execution` / `ExecutionState`: per-invocation state machine
//! - `CommandRunner` / `SystemRunner`: OS process seam
//! - `PrivilegedBackend`: direct `sudo systemctl` or the device supervisor
//! - `CommandExecutor::execute`: lookup, dry run, dispatch
//!
//! ## Execution Flow
//! ```text
//! name not whitelisted → UnknownCommand (logged, nothing runs)
//! dry run              → DryRun (logged, nothing runs)
//! reboot / shutdown    → backend, one attempt (supervisor retries internally)
//! set_ip_addresses     → network refresh
//! ```
//!
//! ## State Machine
//! ```text
//! Pending → Dispatched → Succeeded
//!                      → Failed(reason)
//!                      → TimedOut
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never retry a failed direct invocation here. The command was already
//!   accepted and counted against the cooldown; a retry risks a double reboot
//! - Captured output is truncated before it reaches the logs
//!
//! ## Last Modified
//! v0.1.0 - Initial executor

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info, warn};

use hostcmd_common::types::{CommandName, REBOOT, SET_IP_ADDRESSES, SHUTDOWN};

use super::network::NetworkRefresh;
use super::retry::RetryPolicy;
use super::supervisor::{request_with_retry, PowerAction, PowerBackend};
use crate::error::{AgentError, Result};

/// Default timeout for OS invocations.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of output bytes kept for logging.
pub const DEFAULT_OUTPUT_LIMIT: usize = 500;

const REBOOT_ARGV: &[&str] = &["/usr/bin/sudo", "-n", "/usr/bin/systemctl", "reboot"];
const SHUTDOWN_ARGV: &[&str] = &["/usr/bin/sudo", "-n", "/usr/bin/systemctl", "poweroff"];

// ============================================
// HostAction
// ============================================

/// Whitelisted host action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostAction {
    /// Reboot the host.
    Reboot,
    /// Power off the host.
    Shutdown,
    /// Rediscover and publish network addresses.
    SetIpAddresses,
}

impl HostAction {
    /// Looks up a command name in the whitelist.
    #[must_use]
    pub fn from_command(cmd: &str) -> Option<Self> {
        match cmd {
            REBOOT => Some(Self::Reboot),
            SHUTDOWN => Some(Self::Shutdown),
            SET_IP_ADDRESSES => Some(Self::SetIpAddresses),
            _ => None,
        }
    }

    /// Command name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reboot => REBOOT,
            Self::Shutdown => SHUTDOWN,
            Self::SetIpAddresses => SET_IP_ADDRESSES,
        }
    }

    /// Argument vector for actions that run an OS command.
    #[must_use]
    pub const fn argv(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Reboot => Some(REBOOT_ARGV),
            Self::Shutdown => Some(SHUTDOWN_ARGV),
            Self::SetIpAddresses => None,
        }
    }

    /// Power action, if this is one.
    #[must_use]
    pub const fn power_action(&self) -> Option<PowerAction> {
        match self {
            Self::Reboot => Some(PowerAction::Reboot),
            Self::Shutdown => Some(PowerAction::Shutdown),
            Self::SetIpAddresses => None,
        }
    }
}

impl fmt::Display for HostAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Execution State
// ============================================

/// State of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionState {
    /// Accepted, not yet started.
    Pending,
    /// Handed to a backend.
    Dispatched,
    /// Completed successfully.
    Succeeded,
    /// Completed with an error.
    Failed(String),
    /// Exceeded its timeout.
    TimedOut,
}

impl ExecutionState {
    /// Returns `true` for end states.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::TimedOut)
    }

    /// Returns `true` if `next` may follow `self`.
    #[must_use]
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Dispatched),
            Self::Dispatched => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Dispatched => f.write_str("dispatched"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Record of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// What ran.
    pub action: HostAction,
    /// Where it got to.
    pub state: ExecutionState,
    /// Exit code of the OS command, if one ran to completion.
    pub exit_code: Option<i32>,
}

impl Execution {
    /// Starts a record in `Pending`.
    #[must_use]
    pub const fn new(action: HostAction) -> Self {
        Self {
            action,
            state: ExecutionState::Pending,
            exit_code: None,
        }
    }

    /// Moves to `next`.
    ///
    /// # Errors
    /// Returns `Internal` for a transition the state machine forbids.
    pub fn transition(&mut self, next: ExecutionState) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(AgentError::internal(format!(
                "invalid execution transition {} -> {}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    fn finish(&mut self, next: ExecutionState) {
        if let Err(e) = self.transition(next) {
            error!(action = %self.action, error = %e, "Execution state error");
        }
    }
}

/// What `execute` did with a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Not whitelisted; dropped.
    UnknownCommand(CommandName),
    /// Dry run; logged only.
    DryRun(HostAction),
    /// Ran to a terminal state.
    Finished(Execution),
}

// ============================================
// Command Runner
// ============================================

/// Result of running an OS command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    /// Process exited. `code` is `None` when killed by a signal.
    Exited {
        /// Exit code
        code: Option<i32>,
        /// Captured stdout
        stdout: String,
        /// Captured stderr
        stderr: String,
    },
    /// Process exceeded the timeout and was killed.
    TimedOut,
    /// Process could not be started.
    SpawnFailed(String),
}

/// Runs OS commands.
#[async_trait]
pub trait CommandRunner: Send + Sync + fmt::Debug {
    /// Runs `argv` with `timeout`, capturing output.
    async fn run(&self, argv: &[&str], timeout: Duration) -> RunResult;
}

/// Runs commands with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, argv: &[&str], timeout: Duration) -> RunResult {
        let Some((program, args)) = argv.split_first() else {
            return RunResult::SpawnFailed("empty argument vector".into());
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(timeout, command.output()).await {
            Err(_) => RunResult::TimedOut,
            Ok(Err(e)) => RunResult::SpawnFailed(e.to_string()),
            Ok(Ok(output)) => RunResult::Exited {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
        }
    }
}

/// Cuts `text` to at most `limit` bytes on a char boundary.
#[must_use]
pub fn truncate_output(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ============================================
// Privileged Backend
// ============================================

/// How reboot and shutdown are carried out.
#[derive(Debug, Clone)]
pub enum PrivilegedBackend {
    /// `sudo systemctl` through a runner.
    Direct(Arc<dyn CommandRunner>),
    /// Device supervisor HTTP API, retried under `policy`.
    Supervisor {
        /// Supervisor client
        backend: Arc<dyn PowerBackend>,
        /// Retry policy per request
        policy: RetryPolicy,
    },
}

// ============================================
// CommandExecutor
// ============================================

/// Executes whitelisted host actions.
#[derive(Debug)]
pub struct CommandExecutor {
    backend: PrivilegedBackend,
    network: Arc<dyn NetworkRefresh>,
    dry_run: bool,
    timeout: Duration,
    output_limit: usize,
}

impl CommandExecutor {
    /// Creates an executor with default timeout and output limit.
    pub fn new(backend: PrivilegedBackend, network: Arc<dyn NetworkRefresh>) -> Self {
        Self {
            backend,
            network,
            dry_run: false,
            timeout: DEFAULT_EXEC_TIMEOUT,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    /// Enables or disables dry run.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the OS invocation timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how many output bytes are logged.
    #[must_use]
    pub const fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit;
        self
    }

    /// Returns `true` in dry-run mode.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Executes `cmd` if it is whitelisted.
    ///
    /// Failures are logged and reported in the outcome, never returned.
    pub async fn execute(&self, cmd: &CommandName) -> ExecutionOutcome {
        let Some(action) = HostAction::from_command(cmd.as_str()) else {
            warn!(cmd = %cmd, "Unable to perform host command: no such command");
            return ExecutionOutcome::UnknownCommand(cmd.clone());
        };

        if self.dry_run {
            warn!(
                cmd = %action,
                argv = ?action.argv(),
                "Would have executed host command, dry run enabled"
            );
            return ExecutionOutcome::DryRun(action);
        }

        let mut execution = Execution::new(action);
        execution.finish(ExecutionState::Dispatched);
        info!(cmd = %action, "Executing host command");

        let state = match action.power_action() {
            Some(power) => self.run_power(power, &mut execution).await,
            None => self.run_network_refresh().await,
        };
        execution.finish(state);

        ExecutionOutcome::Finished(execution)
    }

    async fn run_power(&self, power: PowerAction, execution: &mut Execution) -> ExecutionState {
        match &self.backend {
            PrivilegedBackend::Supervisor { backend, policy } => {
                match request_with_retry(backend.as_ref(), power, policy).await {
                    Ok(()) => ExecutionState::Succeeded,
                    Err(e) => ExecutionState::Failed(e.to_string()),
                }
            }
            PrivilegedBackend::Direct(runner) => {
                let Some(argv) = execution.action.argv() else {
                    return ExecutionState::Failed("no argument vector".into());
                };
                self.run_direct(runner.as_ref(), argv, execution).await
            }
        }
    }

    async fn run_direct(
        &self,
        runner: &dyn CommandRunner,
        argv: &[&str],
        execution: &mut Execution,
    ) -> ExecutionState {
        let cmd = execution.action;
        match runner.run(argv, self.timeout).await {
            RunResult::Exited {
                code,
                stdout,
                stderr,
            } => {
                execution.exit_code = code;
                let stdout = truncate_output(&stdout, self.output_limit);
                let stderr = truncate_output(&stderr, self.output_limit);
                if code == Some(0) {
                    info!(cmd = %cmd, rc = 0, stdout, stderr, "Host command completed");
                    ExecutionState::Succeeded
                } else {
                    error!(cmd = %cmd, rc = ?code, stdout, stderr, "Host command failed");
                    ExecutionState::Failed(match code {
                        Some(rc) => format!("exit status {rc}"),
                        None => "terminated by signal".to_string(),
                    })
                }
            }
            RunResult::TimedOut => {
                error!(cmd = %cmd, timeout = ?self.timeout, "Host command timed out");
                ExecutionState::TimedOut
            }
            RunResult::SpawnFailed(reason) => {
                error!(cmd = %cmd, error = %reason, "Host command could not be started");
                ExecutionState::Failed(reason)
            }
        }
    }

    async fn run_network_refresh(&self) -> ExecutionState {
        match self.network.refresh().await {
            Ok(_) => ExecutionState::Succeeded,
            Err(e) => {
                error!(error = %e, "Network address refresh failed");
                ExecutionState::Failed(e.to_string())
            }
        }
    }
}

// ============================================
// Tests
// ============================================
