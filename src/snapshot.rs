//! Published per-host view of the session.
//!
//! [`SessionStore`] holds one slot per configured host for the whole session.
//! The aggregator replaces a host's [`HostSnapshot`] by swapping in a new
//! `Arc`, so a reader always sees either the old value or the new one and the
//! writer never waits for readers to finish.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::probe::CheckSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HostStatus {
    /// No attempt has completed yet.
    Pending,
    Online,
    /// Reachable now, but failed at least once in the trailing window.
    Unstable,
    Offline,
}

impl HostStatus {
    pub fn from_latest(latest: Option<&CheckSample>, recent_failures: u64) -> Self {
        match latest {
            None => HostStatus::Pending,
            Some(sample) if !sample.is_success() => HostStatus::Offline,
            Some(_) if recent_failures > 0 => HostStatus::Unstable,
            Some(_) => HostStatus::Online,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSnapshot {
    pub hostname: String,
    pub status: HostStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub session_average_latency: u64,
    pub five_minute_average_latency: u64,
    pub five_minute_failures: u64,
}

impl HostSnapshot {
    pub fn pending(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            status: HostStatus::Pending,
            last_seen: None,
            session_average_latency: 0,
            five_minute_average_latency: 0,
            five_minute_failures: 0,
        }
    }
}

/// Owned copy of the whole session, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSnapshot {
    pub session_start: DateTime<Utc>,
    pub port: u16,
    pub hosts: BTreeMap<String, HostSnapshot>,
}

#[derive(Debug)]
pub struct SessionStore {
    session_start: DateTime<Utc>,
    port: u16,
    hosts: BTreeMap<String, ArcSwap<HostSnapshot>>,
}

impl SessionStore {
    pub fn new<S: AsRef<str>>(port: u16, hostnames: &[S]) -> Self {
        Self::with_start(Utc::now(), port, hostnames)
    }

    pub fn with_start<S: AsRef<str>>(session_start: DateTime<Utc>, port: u16, hostnames: &[S]) -> Self {
        let hosts = hostnames
            .iter()
            .map(|name| {
                let name = name.as_ref().to_string();
                let slot = ArcSwap::from_pointee(HostSnapshot::pending(name.clone()));
                (name, slot)
            })
            .collect();

        Self {
            session_start,
            port,
            hosts,
        }
    }

    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    pub fn host(&self, hostname: &str) -> Option<Arc<HostSnapshot>> {
        self.hosts.get(hostname).map(|slot| slot.load_full())
    }

    /// Replaces the snapshot of an already-registered host.
    /// Returns `false` if the host is not part of this session.
    pub(crate) fn publish(&self, snapshot: HostSnapshot) -> bool {
        match self.hosts.get(&snapshot.hostname) {
            Some(slot) => {
                slot.store(Arc::new(snapshot));
                true
            }
            None => false,
        }
    }

    /// Hosts are loaded one at a time; two hosts may reflect different instants.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let hosts = self
            .hosts
            .iter()
            .map(|(name, slot)| (name.clone(), HostSnapshot::clone(&slot.load())))
            .collect();

        DashboardSnapshot {
            session_start: self.session_start,
            port: self.port,
            hosts,
        }
    }
}
