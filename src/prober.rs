use std::future::Future;
use std::io;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::channel::EventSender;
use crate::probe::{CheckSample, ProbeEvent};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Capability to open a TCP connection and report how long it took.
pub trait Dialer: Send + Sync + 'static {
    fn dial(
        &self,
        hostname: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = io::Result<Duration>> + Send;
}

/// Dials with tokio and closes the stream as soon as it is established.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    async fn dial(&self, hostname: &str, port: u16, timeout: Duration) -> io::Result<Duration> {
        let started = Instant::now();
        let stream = tokio::time::timeout(timeout, TcpStream::connect((hostname, port)))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        let elapsed = started.elapsed();
        drop(stream);
        Ok(elapsed)
    }
}

/// Polls one host:port forever, one attempt per interval.
pub struct Prober<D = TcpDialer> {
    hostname: String,
    port: u16,
    interval: Duration,
    dialer: D,
}

impl<D: Dialer> Prober<D> {
    pub fn with_dialer(hostname: impl Into<String>, port: u16, interval: Duration, dialer: D) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            interval,
            dialer,
        }
    }

    /// Makes a single connection attempt. Never retries.
    pub async fn probe_once(&self) -> CheckSample {
        match self.dialer.dial(&self.hostname, self.port, CONNECT_TIMEOUT).await {
            Ok(elapsed) => {
                let latency_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                debug!("{}:{} connected in {}ms", self.hostname, self.port, latency_ms);
                CheckSample::success(Utc::now(), latency_ms)
            }
            Err(e) => {
                warn!("Connection error: {}:{} {}", self.hostname, self.port, e);
                CheckSample::failure(Utc::now())
            }
        }
    }

    /// Runs the polling loop. Returns only if the aggregator has gone away.
    pub async fn run(self, sender: EventSender) {
        loop {
            let sample = self.probe_once().await;
            if sender.send(ProbeEvent::new(self.hostname.clone(), sample)).is_err() {
                debug!("aggregator closed, stopping prober for {}", self.hostname);
                return;
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    pub fn spawn(self, sender: EventSender) -> JoinHandle<()> {
        tokio::spawn(self.run(sender))
    }
}
