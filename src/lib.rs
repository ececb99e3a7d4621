//! Continuous TCP reachability monitoring.
//!
//! One [`Prober`] task per host dials `host:port` on a fixed cadence and sends
//! every result down a shared channel. A single [`Aggregator`] task drains the
//! channel, keeps each host's full history and publishes a fresh
//! [`HostSnapshot`] into the [`SessionStore`] after every sample. Anything
//! that wants to show the state (the bundled HTTP [`server`], tests) reads the
//! store.

pub mod aggregate;
pub mod channel;
pub mod config;
pub mod probe;
pub mod prober;
pub mod server;
pub mod snapshot;

use std::sync::Arc;

use log::info;
use tokio::task::{JoinError, JoinHandle};

pub use aggregate::{Aggregator, HostLog, Summary, average_latency, summarize};
pub use config::{ConfigError, MonitorConfig, Settings};
pub use probe::{CheckOutcome, CheckSample, ProbeEvent};
pub use prober::{Dialer, Prober, TcpDialer};
pub use snapshot::{DashboardSnapshot, HostSnapshot, HostStatus, SessionStore};

/// Running probers and aggregator of one monitoring session.
pub struct Session {
    store: Arc<SessionStore>,
    probers: Vec<JoinHandle<()>>,
    aggregator: JoinHandle<()>,
}

impl Session {
    /// Spawns the session onto the current tokio runtime.
    pub fn start(config: &MonitorConfig) -> Self {
        Self::start_with_dialer(config, TcpDialer)
    }

    /// Like [`Session::start`], dialing through `dialer` instead of TCP.
    pub fn start_with_dialer<D: Dialer + Clone>(config: &MonitorConfig, dialer: D) -> Self {
        info!(
            "Preparing to monitor port {} every {} milliseconds on hosts {}",
            config.port,
            config.interval.as_millis(),
            config.hosts.join(" ")
        );

        let store = Arc::new(SessionStore::new(config.port, config.hosts.as_slice()));
        let (sender, receiver) = channel::event_channel();

        let probers = config
            .hosts
            .iter()
            .map(|host| {
                Prober::with_dialer(host.clone(), config.port, config.interval, dialer.clone())
                    .spawn(sender.clone())
            })
            .collect();
        drop(sender);

        let aggregator = tokio::spawn(Aggregator::new(store.clone()).run(receiver));

        Self {
            store,
            probers,
            aggregator,
        }
    }

    /// Shared handle to the published snapshots.
    pub fn store(&self) -> Arc<SessionStore> {
        self.store.clone()
    }

    /// Waits for the aggregator, which only finishes once every prober has.
    pub async fn wait(self) -> Result<(), JoinError> {
        self.aggregator.await
    }

    /// Cancels every prober and the aggregator.
    pub fn abort(&self) {
        for prober in &self.probers {
            prober.abort();
        }
        self.aggregator.abort();
    }
}
