//! Fan-in conduit between the probers and the aggregator.
//!
//! Every prober holds a clone of the sender; the aggregator owns the only
//! receiver. The channel is unbounded, so a prober never waits on the
//! aggregator, and each sender's messages arrive in the order they were sent.

use tokio::sync::mpsc;

use crate::probe::ProbeEvent;

pub type EventSender = mpsc::UnboundedSender<ProbeEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ProbeEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::CheckSample;
    use chrono::Utc;

    #[tokio::test]
    async fn preserves_order_of_a_single_sender() {
        let (tx, mut rx) = event_channel();
        let now = Utc::now();
        for latency in 1..=5 {
            tx.send(ProbeEvent::new("alpha", CheckSample::success(now, latency)))
                .unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event.sample.latency_ms().unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }
}
