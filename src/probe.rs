use chrono::{DateTime, Utc};

/// Result of a single connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Success { latency_ms: u64 },
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSample {
    pub timestamp: DateTime<Utc>,
    pub outcome: CheckOutcome,
}

impl CheckSample {
    pub fn success(timestamp: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            timestamp,
            outcome: CheckOutcome::Success { latency_ms },
        }
    }

    pub fn failure(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            outcome: CheckOutcome::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Success { .. })
    }

    /// Latency of a successful attempt, `None` for a failure.
    pub fn latency_ms(&self) -> Option<u64> {
        match self.outcome {
            CheckOutcome::Success { latency_ms } => Some(latency_ms),
            CheckOutcome::Failure => None,
        }
    }
}

/// A sample tagged with the host that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEvent {
    pub hostname: String,
    pub sample: CheckSample,
}

impl ProbeEvent {
    pub fn new(hostname: impl Into<String>, sample: CheckSample) -> Self {
        Self {
            hostname: hostname.into(),
            sample,
        }
    }
}
