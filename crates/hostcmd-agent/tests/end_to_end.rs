//! End-to-end scenarios: control plane → bus → agent → executor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use hostcmd_agent::handlers::{Disposition, MessageHandler};
use hostcmd_agent::services::executor::{
    CommandExecutor, CommandRunner, ExecutionOutcome, ExecutionState, HostAction,
    PrivilegedBackend, RunResult,
};
use hostcmd_agent::services::network::NetworkRefresh;
use hostcmd_agent::services::rate_limit::RateLimiter;
use hostcmd_agent::{Agent, ControlPlane, Delivery, Result, HOST_AGENT_READY_KEY};
use hostcmd_common::time::{ManualClock, Timestamp};
use hostcmd_core::crypto::SharedSecret;
use hostcmd_core::protocol::encode_envelope;
use hostcmd_core::replay::NonceCache;
use hostcmd_core::signer::CommandSigner;
use hostcmd_core::validator::{CommandValidator, ValidatorConfig};
use hostcmd_transport::memory::MemoryBus;
use hostcmd_transport::traits::{BusMessage, Publisher};

const NOW: i64 = 1_750_000_000;
const CHANNEL: &str = "hostcmd";
const SECRET: &str = "e2e-shared-secret";

// ============================================
// Test doubles
// ============================================

#[derive(Debug, Default)]
struct RecordingRunner {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingRunner {
    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, argv: &[&str], _timeout: Duration) -> RunResult {
        self.calls
            .lock()
            .push(argv.iter().map(ToString::to_string).collect());
        RunResult::Exited {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

#[derive(Debug, Default)]
struct RecordingNetwork(Mutex<u32>);

#[async_trait]
impl NetworkRefresh for RecordingNetwork {
    async fn refresh(&self) -> Result<Vec<String>> {
        *self.0.lock() += 1;
        Ok(vec!["192.168.1.20".into()])
    }
}

struct Device {
    handler: MessageHandler,
    runner: Arc<RecordingRunner>,
    network: Arc<RecordingNetwork>,
    signer: CommandSigner,
}

fn device(dry_run: bool) -> Device {
    device_at(dry_run, NOW)
}

fn device_at(dry_run: bool, now: i64) -> Device {
    let secret = Arc::new(SharedSecret::new(SECRET).unwrap());
    let clock = Arc::new(ManualClock::new(now));
    let runner = Arc::new(RecordingRunner::default());
    let network = Arc::new(RecordingNetwork::default());

    let executor = CommandExecutor::new(PrivilegedBackend::Direct(runner.clone()), network.clone())
        .with_dry_run(dry_run);
    let handler = MessageHandler::new(
        CHANNEL,
        CommandValidator::with_clock(Some(secret.clone()), ValidatorConfig::default(), clock.clone()),
        NonceCache::new(),
        RateLimiter::new(300, ["reboot", "shutdown"]),
        executor,
    )
    .with_clock(clock.clone());

    Device {
        handler,
        runner,
        network,
        signer: CommandSigner::with_clock(Some(secret), clock),
    }
}

// ============================================
// Scenarios
// ============================================

#[tokio::test]
async fn reboot_delivered_twice_runs_once() {
    let dev = device(false);
    let message = BusMessage::message(CHANNEL, dev.signer.sign_payload("reboot").unwrap());

    let first = dev.handler.process(&message).await;
    let second = dev.handler.process(&message).await;

    assert!(matches!(
        first,
        Disposition::Dispatched(ExecutionOutcome::Finished(ref e)) if e.state == ExecutionState::Succeeded
    ));
    assert_eq!(second, Disposition::Rejected { reason: "replay" });
    assert_eq!(
        dev.runner.calls(),
        vec![vec!["/usr/bin/sudo", "-n", "/usr/bin/systemctl", "reboot"]]
    );
}

#[tokio::test]
async fn hour_old_shutdown_is_stale() {
    let dev = device(false);
    let envelope = dev
        .signer
        .sign_at("shutdown", Timestamp::from_secs(NOW - 3_600))
        .unwrap();
    let message = BusMessage::message(CHANNEL, encode_envelope(&envelope).unwrap());

    assert_eq!(
        dev.handler.process(&message).await,
        Disposition::Rejected { reason: "stale" }
    );
    assert!(dev.runner.calls().is_empty());
}

#[tokio::test]
async fn unknown_command_never_spawns() {
    let dev = device(false);
    let message = BusMessage::message(CHANNEL, dev.signer.sign_payload("format_disk").unwrap());

    assert_eq!(
        dev.handler.process(&message).await,
        Disposition::Dispatched(ExecutionOutcome::UnknownCommand("format_disk".into()))
    );
    assert!(dev.runner.calls().is_empty());
    assert_eq!(*dev.network.0.lock(), 0);
}

#[tokio::test]
async fn dry_run_reboot_is_accepted_but_not_run() {
    let dev = device(true);
    let message = BusMessage::message(CHANNEL, dev.signer.sign_payload("reboot").unwrap());

    assert_eq!(
        dev.handler.process(&message).await,
        Disposition::Dispatched(ExecutionOutcome::DryRun(HostAction::Reboot))
    );
    assert!(dev.runner.calls().is_empty());

    // The cooldown was still consumed
    let again = BusMessage::message(CHANNEL, dev.signer.sign_payload("reboot").unwrap());
    assert_eq!(
        dev.handler.process(&again).await,
        Disposition::RateLimited("reboot".into())
    );
}

#[tokio::test]
async fn set_ip_addresses_is_not_rate_limited() {
    let dev = device(false);
    for _ in 0..3 {
        let message =
            BusMessage::message(CHANNEL, dev.signer.sign_payload("set_ip_addresses").unwrap());
        assert!(matches!(
            dev.handler.process(&message).await,
            Disposition::Dispatched(ExecutionOutcome::Finished(_))
        ));
    }
    assert_eq!(*dev.network.0.lock(), 3);
}

#[tokio::test]
async fn control_plane_to_running_agent() {
    let bus = MemoryBus::new();
    let dev = device_at(false, Timestamp::now().as_secs());
    let runner = dev.runner.clone();

    let agent = Arc::new(Agent::new(Arc::new(bus.clone()), dev.handler));
    let task = {
        let agent = Arc::clone(&agent);
        tokio::spawn(async move { agent.run().await })
    };
    bus.wait_for_subscribers(1).await;

    let secret = SharedSecret::new(SECRET).map(Arc::new);
    let plane = ControlPlane::new(CommandSigner::new(secret), Arc::new(bus.clone()), CHANNEL);

    // Noise on an unrelated channel never reaches the handler chain
    bus.publish("viewer", b"noise").await.unwrap();

    for cmd in ["reboot", "shutdown"] {
        assert_eq!(
            plane.request(cmd).await.unwrap(),
            Delivery::Published { receivers: 1 }
        );
    }

    while runner.calls().len() < 2 {
        tokio::task::yield_now().await;
    }
    agent.shutdown();
    task.await.unwrap().unwrap();

    assert_eq!(bus.status(HOST_AGENT_READY_KEY).as_deref(), Some("true"));
    assert_eq!(runner.calls()[1][3], "poweroff");
    assert_eq!(agent.handler().remembered_nonces(), 2);
}

#[tokio::test]
async fn closed_bus_ends_agent() {
    let bus = MemoryBus::new();
    bus.close();

    let agent = Agent::new(Arc::new(bus.clone()), device(false).handler);
    assert!(agent.run().await.is_err());
    assert!(bus.status(HOST_AGENT_READY_KEY).is_none());
}
