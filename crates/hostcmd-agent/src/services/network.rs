// ============================================
// File: crates/hostcmd-agent/src/services/network.rs
// ============================================
//! # Network Address Refresh
//!
//! ## Creation Reason
//! The `set_ip_addresses` command asks the agent to rediscover the host's
//! addresses and publish them to the status store, where the rest of the
//! system reads them.
//!
//! ## Main Functionality
//! - `ConnectivityProbe` / `HttpProbe`: "is the Internet up yet?"
//! - `AddressSource` / `SystemInterfaces`: interface enumeration
//! - `select_addresses`: prefix filter and link-local exclusion
//! - `NetworkRefresher`: the full refresh sequence
//!
//! ## Refresh Sequence
//! ```text
//! SET ip_addresses_ready false
//! probe (retried); exhaustion only warns
//! SET ip_addresses_ready true
//! SET ip_addresses   ["192.168.1.10", "2001:db8::10", ...]
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `ip_addresses_ready` is set back to `true` even when the probe never
//!   succeeds; readers only use it to wait out an in-flight refresh
//! - Store failures abort the refresh and are returned to the executor
//!
//! ## Last Modified
//! v0.1.0 - Initial network refresh

use std::fmt;
use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use hostcmd_transport::traits::StatusStore;

use super::retry::{retry, RetryPolicy};
use crate::error::{AgentError, Result};

/// Status key set to `"false"` while a refresh is in progress.
pub const IP_ADDRESSES_READY_KEY: &str = "ip_addresses_ready";

/// Status key holding the JSON list of addresses.
pub const IP_ADDRESSES_KEY: &str = "ip_addresses";

// ============================================
// Connectivity Probe
// ============================================

/// Checks outbound connectivity.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync + fmt::Debug {
    /// Performs one probe.
    ///
    /// # Errors
    /// Returns `Probe` if the target is unreachable or answers non-2xx.
    async fn probe(&self) -> Result<()>;
}

/// Probe issuing `GET {url}`.
#[derive(Debug)]
pub struct HttpProbe {
    http: Client,
    url: String,
}

impl HttpProbe {
    /// Creates a probe for `url`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::startup_failed(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> Result<()> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AgentError::Probe {
                reason: e.to_string(),
            })?;

        response.error_for_status().map_err(|e| AgentError::Probe {
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

// ============================================
// Address Source
// ============================================

/// One address bound to an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddr {
    /// Interface name, e.g. `eth0`.
    pub interface: String,
    /// Bound address.
    pub addr: IpAddr,
}

impl InterfaceAddr {
    /// Creates an entry.
    pub fn new(interface: impl Into<String>, addr: impl Into<IpAddr>) -> Self {
        Self {
            interface: interface.into(),
            addr: addr.into(),
        }
    }
}

/// Lists the host's interface addresses.
pub trait AddressSource: Send + Sync + fmt::Debug {
    /// Returns every IPv4 and IPv6 address in interface order.
    ///
    /// # Errors
    /// Returns `Interfaces` if enumeration fails.
    fn addresses(&self) -> Result<Vec<InterfaceAddr>>;
}

/// Reads addresses with `getifaddrs(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl AddressSource for SystemInterfaces {
    fn addresses(&self) -> Result<Vec<InterfaceAddr>> {
        let addrs = nix::ifaddrs::getifaddrs().map_err(|e| AgentError::Interfaces {
            reason: e.to_string(),
        })?;

        let mut out = Vec::new();
        for ifaddr in addrs {
            let Some(storage) = ifaddr.address else {
                continue;
            };
            if let Some(sin) = storage.as_sockaddr_in() {
                out.push(InterfaceAddr::new(
                    ifaddr.interface_name.as_str(),
                    *SocketAddrV4::from(*sin).ip(),
                ));
            } else if let Some(sin6) = storage.as_sockaddr_in6() {
                out.push(InterfaceAddr::new(
                    ifaddr.interface_name.as_str(),
                    *SocketAddrV6::from(*sin6).ip(),
                ));
            }
        }
        Ok(out)
    }
}

/// Returns `true` for 169.254.0.0/16 and fe80::/10.
#[must_use]
pub fn is_link_local(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

/// Keeps addresses of interfaces starting with one of `prefixes`, drops
/// link-local ones, and renders the rest in order.
#[must_use]
pub fn select_addresses(entries: &[InterfaceAddr], prefixes: &[String]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| prefixes.iter().any(|p| e.interface.starts_with(p.as_str())))
        .filter(|e| !is_link_local(&e.addr))
        .map(|e| e.addr.to_string())
        .collect()
}

// ============================================
// NetworkRefresh
// ============================================

/// Runs a network address refresh.
#[async_trait]
pub trait NetworkRefresh: Send + Sync + fmt::Debug {
    /// Refreshes and publishes the address list, returning it.
    ///
    /// # Errors
    /// Returns error if the status store or interface enumeration fails.
    async fn refresh(&self) -> Result<Vec<String>>;
}

/// Default refresh: probe, enumerate, publish.
pub struct NetworkRefresher {
    status: Arc<dyn StatusStore>,
    probe: Arc<dyn ConnectivityProbe>,
    source: Arc<dyn AddressSource>,
    policy: RetryPolicy,
    prefixes: Vec<String>,
}

impl NetworkRefresher {
    /// Creates a refresher.
    pub fn new(
        status: Arc<dyn StatusStore>,
        probe: Arc<dyn ConnectivityProbe>,
        source: Arc<dyn AddressSource>,
        policy: RetryPolicy,
        prefixes: Vec<String>,
    ) -> Self {
        Self {
            status,
            probe,
            source,
            policy,
            prefixes,
        }
    }
}

#[async_trait]
impl NetworkRefresh for NetworkRefresher {
    async fn refresh(&self) -> Result<Vec<String>> {
        self.status.set_status(IP_ADDRESSES_READY_KEY, "false").await?;

        let probe = &self.probe;
        if retry(&self.policy, "connectivity probe", |_| probe.probe())
            .await
            .is_err()
        {
            warn!("Unable to connect to the Internet, proceeding with the addresses currently available");
        }

        self.status.set_status(IP_ADDRESSES_READY_KEY, "true").await?;

        let entries = self.source.addresses()?;
        let addresses = select_addresses(&entries, &self.prefixes);
        debug!(total = entries.len(), selected = addresses.len(), "Enumerated interfaces");

        let json = serde_json::to_string(&addresses)
            .map_err(|e| AgentError::internal(format!("address list: {e}")))?;
        self.status.set_status(IP_ADDRESSES_KEY, &json).await?;

        info!(addresses = %json, "Published IP addresses");
        Ok(addresses)
    }
}

impl fmt::Debug for NetworkRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkRefresher")
            .field("probe", &self.probe)
            .field("source", &self.source)
            .field("policy", &self.policy)
            .field("prefixes", &self.prefixes)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::sync::atomic::{AtomicU32, Ordering};

    use hostcmd_transport::memory::MemoryBus;

    #[derive(Debug)]
    struct CountingProbe {
        succeed_on: Option<u32>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ConnectivityProbe for CountingProbe {
        async fn probe(&self) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.succeed_on {
                Some(k) if n >= k => Ok(()),
                _ => Err(AgentError::Probe {
                    reason: "unreachable".into(),
                }),
            }
        }
    }

    #[derive(Debug)]
    struct FixedAddresses(Vec<InterfaceAddr>);

    impl AddressSource for FixedAddresses {
        fn addresses(&self) -> Result<Vec<InterfaceAddr>> {
            Ok(self.0.clone())
        }
    }

    fn prefixes() -> Vec<String> {
        ["wlan", "eth", "wlp", "enp", "eno"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn sample() -> Vec<InterfaceAddr> {
        vec![
            InterfaceAddr::new("lo", Ipv4Addr::LOCALHOST),
            InterfaceAddr::new("eth0", Ipv4Addr::new(192, 168, 1, 10)),
            InterfaceAddr::new("eth0", Ipv4Addr::new(169, 254, 3, 4)),
            InterfaceAddr::new("eth0", "fe80::1".parse::<Ipv6Addr>().unwrap()),
            InterfaceAddr::new("eth0", "2001:db8::10".parse::<Ipv6Addr>().unwrap()),
            InterfaceAddr::new("docker0", Ipv4Addr::new(172, 17, 0, 1)),
            InterfaceAddr::new("wlan0", Ipv4Addr::new(10, 0, 0, 7)),
        ]
    }

    fn refresher(bus: &MemoryBus, probe: Arc<CountingProbe>) -> NetworkRefresher {
        NetworkRefresher::new(
            Arc::new(bus.clone()),
            probe,
            Arc::new(FixedAddresses(sample())),
            RetryPolicy::new(3, Duration::from_millis(1)),
            prefixes(),
        )
    }

    #[test]
    fn test_select_addresses_filters() {
        let selected = select_addresses(&sample(), &prefixes());
        assert_eq!(selected, vec!["192.168.1.10", "2001:db8::10", "10.0.0.7"]);
    }

    #[test]
    fn test_link_local_detection() {
        assert!(is_link_local(&"169.254.0.1".parse().unwrap()));
        assert!(is_link_local(&"febf::1".parse().unwrap()));
        assert!(!is_link_local(&"fec0::1".parse().unwrap()));
        assert!(!is_link_local(&"10.0.0.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_refresh_sequence() {
        let bus = MemoryBus::new();
        let probe = Arc::new(CountingProbe {
            succeed_on: Some(2),
            calls: AtomicU32::new(0),
        });

        let addresses = refresher(&bus, probe.clone()).refresh().await.unwrap();
        assert_eq!(addresses.len(), 3);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);

        let log = bus.status_log();
        let keys: Vec<(&str, &str)> = log.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(keys[0], (IP_ADDRESSES_READY_KEY, "false"));
        assert_eq!(keys[1], (IP_ADDRESSES_READY_KEY, "true"));
        assert_eq!(keys[2].0, IP_ADDRESSES_KEY);

        let stored: Vec<String> = serde_json::from_str(&bus.status(IP_ADDRESSES_KEY).unwrap()).unwrap();
        assert_eq!(stored, addresses);
    }

    #[tokio::test]
    async fn test_probe_exhaustion_still_publishes() {
        let bus = MemoryBus::new();
        let probe = Arc::new(CountingProbe {
            succeed_on: None,
            calls: AtomicU32::new(0),
        });

        refresher(&bus, probe.clone()).refresh().await.unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
        assert_eq!(bus.status(IP_ADDRESSES_READY_KEY).as_deref(), Some("true"));
        assert!(bus.status(IP_ADDRESSES_KEY).is_some());
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let bus = MemoryBus::new();
        bus.close();
        let probe = Arc::new(CountingProbe {
            succeed_on: Some(1),
            calls: AtomicU32::new(0),
        });

        let err = refresher(&bus, probe.clone()).refresh().await.unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }
}
