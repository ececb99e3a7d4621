//! Single consumer of probe events.
//!
//! The aggregator owns every host's log and is the only writer of the
//! [`SessionStore`]. After each event the affected host's snapshot is rebuilt
//! from its entire log, so an update costs time linear in the log length.
//! Logs are never trimmed and grow for as long as the session runs.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, warn};

use crate::channel::EventReceiver;
use crate::probe::{CheckSample, ProbeEvent};
use crate::snapshot::{HostSnapshot, HostStatus, SessionStore};

pub const RECENT_WINDOW_SECS: i64 = 300;

/// Append-only, arrival-ordered samples of one host.
#[derive(Debug, Clone, Default)]
pub struct HostLog {
    samples: Vec<CheckSample>,
}

impl HostLog {
    pub fn push(&mut self, sample: CheckSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[CheckSample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&CheckSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Figures derived from a log at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub recent_samples: u64,
    pub five_minute_failures: u64,
    pub five_minute_average_latency: u64,
    /// Mean over samples older than the trailing window only.
    pub session_average_latency: u64,
}

/// Truncating integer mean; 0 when there is nothing to average.
pub fn average_latency(latencies: impl IntoIterator<Item = u64>) -> u64 {
    let (total, count) = latencies
        .into_iter()
        .fold((0u128, 0u128), |(total, count), l| (total + u128::from(l), count + 1));
    if count == 0 {
        return 0;
    }
    u64::try_from(total / count).unwrap_or(u64::MAX)
}

/// Splits `samples` at `now - 5 min`. A sample is recent when its timestamp is
/// strictly after the cutoff.
pub fn summarize(samples: &[CheckSample], now: DateTime<Utc>) -> Summary {
    let cutoff = now - TimeDelta::seconds(RECENT_WINDOW_SECS);
    let (recent, historical): (Vec<&CheckSample>, Vec<&CheckSample>) =
        samples.iter().partition(|s| s.timestamp > cutoff);

    let recent_latencies: Vec<u64> = recent.iter().filter_map(|s| s.latency_ms()).collect();
    let recent_samples = recent.len() as u64;

    Summary {
        recent_samples,
        five_minute_failures: recent_samples - recent_latencies.len() as u64,
        five_minute_average_latency: average_latency(recent_latencies),
        session_average_latency: average_latency(historical.iter().filter_map(|s| s.latency_ms())),
    }
}

#[derive(Debug, Default)]
struct HostState {
    log: HostLog,
    last_seen: Option<DateTime<Utc>>,
}

pub struct Aggregator {
    hosts: HashMap<String, HostState>,
    store: Arc<SessionStore>,
}

impl Aggregator {
    pub fn new(store: Arc<SessionStore>) -> Self {
        let hosts = store
            .hostnames()
            .map(|name| (name.to_string(), HostState::default()))
            .collect();
        Self { hosts, store }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn log(&self, hostname: &str) -> Option<&HostLog> {
        self.hosts.get(hostname).map(|state| &state.log)
    }

    /// Folds one event into the host's log and publishes the rebuilt snapshot.
    pub fn apply(&mut self, event: ProbeEvent, now: DateTime<Utc>) -> Option<HostSnapshot> {
        let Some(state) = self.hosts.get_mut(&event.hostname) else {
            warn!("dropping sample for unmonitored host {}", event.hostname);
            return None;
        };

        state.log.push(event.sample);
        if event.sample.is_success() {
            state.last_seen = Some(event.sample.timestamp);
        }

        let snapshot = derive_snapshot(&event.hostname, state, now);
        debug!("{:?}", snapshot);
        self.store.publish(snapshot.clone());
        Some(snapshot)
    }

    /// Consumes events until every sender is gone.
    pub async fn run(mut self, mut receiver: EventReceiver) {
        while let Some(event) = receiver.recv().await {
            self.apply(event, Utc::now());
        }
        debug!("event channel closed, aggregator exiting");
    }
}

fn derive_snapshot(hostname: &str, state: &HostState, now: DateTime<Utc>) -> HostSnapshot {
    let summary = summarize(state.log.samples(), now);
    HostSnapshot {
        hostname: hostname.to_string(),
        status: HostStatus::from_latest(state.log.latest(), summary.five_minute_failures),
        last_seen: state.last_seen,
        session_average_latency: summary.session_average_latency,
        five_minute_average_latency: summary.five_minute_average_latency,
        five_minute_failures: summary.five_minute_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn aggregator(hosts: &[&str]) -> Aggregator {
        Aggregator::new(Arc::new(SessionStore::with_start(at(0), 22, hosts)))
    }

    #[test]
    fn average_of_nothing_is_zero() {
        assert_eq!(average_latency(std::iter::empty()), 0);
    }

    #[test]
    fn average_truncates() {
        assert_eq!(average_latency([10, 11]), 10);
        assert_eq!(average_latency([1, 1, 2]), 1);
    }

    #[test]
    fn average_does_not_overflow() {
        assert_eq!(average_latency([u64::MAX, u64::MAX]), u64::MAX);
    }

    #[test]
    fn cutoff_is_exclusive() {
        let now = at(1_000);
        let samples = [
            CheckSample::success(now - TimeDelta::seconds(RECENT_WINDOW_SECS), 40),
            CheckSample::success(now - TimeDelta::seconds(RECENT_WINDOW_SECS - 1), 20),
        ];
        let summary = summarize(&samples, now);
        assert_eq!(summary.recent_samples, 1);
        assert_eq!(summary.five_minute_average_latency, 20);
        assert_eq!(summary.session_average_latency, 40);
    }

    #[test]
    fn failures_plus_successes_cover_the_window() {
        let now = at(1_000);
        let samples = [
            CheckSample::failure(at(100)),
            CheckSample::success(at(800), 5),
            CheckSample::failure(at(900)),
            CheckSample::success(at(950), 0),
            CheckSample::failure(at(990)),
        ];
        let summary = summarize(&samples, now);
        let recent_successes = samples
            .iter()
            .filter(|s| s.timestamp > now - TimeDelta::seconds(RECENT_WINDOW_SECS) && s.is_success())
            .count() as u64;
        assert_eq!(summary.recent_samples, 4);
        assert_eq!(summary.five_minute_failures + recent_successes, summary.recent_samples);
        assert_eq!(summary.five_minute_failures, 2);
        // the 0ms success counts towards the average
        assert_eq!(summary.five_minute_average_latency, 2);
    }

    #[test]
    fn summarize_is_pure() {
        let samples = [CheckSample::success(at(1), 9), CheckSample::failure(at(2))];
        assert_eq!(summarize(&samples, at(3)), summarize(&samples, at(3)));
    }

    #[test]
    fn failure_does_not_advance_last_seen() {
        let mut agg = aggregator(&["alpha"]);
        agg.apply(ProbeEvent::new("alpha", CheckSample::success(at(0), 10)), at(0));
        let snapshot = agg
            .apply(ProbeEvent::new("alpha", CheckSample::failure(at(2))), at(2))
            .unwrap();
        assert_eq!(snapshot.last_seen, Some(at(0)));
        assert_eq!(snapshot.status, HostStatus::Offline);

        let snapshot = agg
            .apply(ProbeEvent::new("alpha", CheckSample::success(at(4), 12)), at(4))
            .unwrap();
        assert_eq!(snapshot.last_seen, Some(at(4)));
        assert_eq!(snapshot.status, HostStatus::Unstable);
    }

    #[test]
    fn two_host_scenario() {
        let mut agg = aggregator(&["alpha", "beta"]);
        agg.apply(ProbeEvent::new("alpha", CheckSample::success(at(0), 10)), at(0));
        agg.apply(ProbeEvent::new("alpha", CheckSample::failure(at(2))), at(2));
        agg.apply(ProbeEvent::new("beta", CheckSample::success(at(0), 5)), at(2));

        let store = agg.store();
        let alpha = store.host("alpha").unwrap();
        let beta = store.host("beta").unwrap();
        assert_eq!(alpha.five_minute_failures, 1);
        assert_eq!(alpha.five_minute_average_latency, 10);
        assert_eq!(beta.five_minute_failures, 0);
        assert_eq!(beta.five_minute_average_latency, 5);
        assert_eq!(beta.status, HostStatus::Online);
    }

    #[test]
    fn all_failures_average_to_zero() {
        let mut agg = aggregator(&["x"]);
        let mut last = None;
        for i in 0..10 {
            last = agg.apply(ProbeEvent::new("x", CheckSample::failure(at(i * 2))), at(20));
        }
        let snapshot = last.unwrap();
        assert_eq!(snapshot.five_minute_failures, 10);
        assert_eq!(snapshot.five_minute_average_latency, 0);
        assert_eq!(snapshot.last_seen, None);
        assert_eq!(agg.log("x").unwrap().len(), 10);
    }

    #[test]
    fn old_samples_move_to_the_session_average() {
        let mut agg = aggregator(&["alpha"]);
        agg.apply(ProbeEvent::new("alpha", CheckSample::success(at(0), 30)), at(0));
        agg.apply(ProbeEvent::new("alpha", CheckSample::failure(at(10))), at(10));
        let snapshot = agg
            .apply(ProbeEvent::new("alpha", CheckSample::success(at(600), 8)), at(600))
            .unwrap();

        assert_eq!(snapshot.session_average_latency, 30);
        assert_eq!(snapshot.five_minute_average_latency, 8);
        assert_eq!(snapshot.five_minute_failures, 0);
        assert_eq!(snapshot.status, HostStatus::Online);
    }

    #[test]
    fn unknown_host_is_ignored() {
        let mut agg = aggregator(&["alpha"]);
        assert!(agg.apply(ProbeEvent::new("gamma", CheckSample::failure(at(0))), at(0)).is_none());
        assert!(agg.log("gamma").is_none());
        assert_eq!(agg.store().host("alpha").unwrap().status, HostStatus::Pending);
    }

    #[tokio::test]
    async fn run_drains_the_channel() {
        let agg = aggregator(&["alpha"]);
        let store = agg.store().clone();
        let (tx, rx) = crate::channel::event_channel();
        tx.send(ProbeEvent::new("alpha", CheckSample::success(Utc::now(), 4))).unwrap();
        drop(tx);

        agg.run(rx).await;
        let alpha = store.host("alpha").unwrap();
        assert_eq!(alpha.status, HostStatus::Online);
        assert_eq!(alpha.five_minute_average_latency, 4);
    }
}
