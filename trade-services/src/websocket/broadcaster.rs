//! Event fan-out to every live subscriber
//!
//! A broadcast never fails. Subscribers whose send fails are pruned from the
//! registry after the delivery pass; the caller only gets a report.

use futures::future::join_all;
use std::time::Duration;
use trade_core::EventEnvelope;
use tracing::{debug, error, info, warn};

use super::registry::SubscriberRegistry;
use super::Frame;

/// Default time a single subscriber may take to accept a frame
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one broadcast call (observability only)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers in the snapshot the event was attempted against
    pub attempted: usize,
    /// Subscribers that accepted the frame
    pub delivered: usize,
    /// Subscribers removed from the registry because their send failed
    pub pruned: usize,
}

/// Delivers event envelopes to the subscribers of a registry
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: SubscriberRegistry,
    send_timeout: Duration,
}

impl Broadcaster {
    pub fn new(registry: SubscriberRegistry) -> Self {
        Self::with_send_timeout(registry, DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_send_timeout(registry: SubscriberRegistry, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Deliver `envelope` to every subscriber live at the time of the call
    ///
    /// Sends to distinct subscribers run concurrently; each subscriber still
    /// sees successive broadcasts in call order.
    pub async fn broadcast(&self, envelope: &EventEnvelope) -> BroadcastReport {
        let subscribers = self.registry.snapshot();
        if subscribers.is_empty() {
            debug!("No subscribers for {} event", envelope.kind());
            return BroadcastReport::default();
        }

        let json = match envelope.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {} event: {}", envelope.kind(), e);
                return BroadcastReport {
                    attempted: subscribers.len(),
                    ..BroadcastReport::default()
                };
            }
        };
        let frame = Frame::text(json);

        info!(
            "Broadcasting {} event to {} connections",
            envelope.kind(),
            subscribers.len()
        );

        let results = join_all(subscribers.iter().map(|subscriber| {
            let frame = frame.clone();
            async move { subscriber.send(frame, self.send_timeout).await }
        }))
        .await;

        let mut report = BroadcastReport {
            attempted: subscribers.len(),
            ..BroadcastReport::default()
        };

        let mut failed = Vec::new();
        for (subscriber, result) in subscribers.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Failed to broadcast to {}: {}", subscriber.id(), e);
                    failed.push(subscriber);
                }
            }
        }

        for subscriber in failed {
            if self.registry.unregister(subscriber).await {
                report.pruned += 1;
            }
        }

        info!(
            "Broadcast of {} complete: {} attempted, {} delivered, {} pruned",
            envelope.kind(),
            report.attempted,
            report.delivered,
            report.pruned
        );

        report
    }
}
