//! Shared helpers for the order feed integration tests

use futures::channel::mpsc;
use futures::{FutureExt, StreamExt};
use std::io;
use std::sync::Arc;
use trade_core::EventEnvelope;
use trade_services::{Broadcaster, Frame, OrderService, OrderStore, SubscriberRegistry};

pub type Outbound = mpsc::UnboundedReceiver<Frame>;
pub type Inbound = mpsc::UnboundedSender<Result<Frame, io::Error>>;

/// Service wired to an in-memory store and a fresh registry
pub fn order_service() -> OrderService {
    let store = Arc::new(OrderStore::new_in_memory().expect("in-memory store"));
    OrderService::new(store, Broadcaster::new(SubscriberRegistry::new()))
}

/// Register an in-memory subscriber, returning the client's two channel ends
pub async fn connect(registry: &SubscriberRegistry) -> (Outbound, Inbound, trade_services::SubscriberId) {
    let (out_tx, out_rx) = mpsc::unbounded();
    let (in_tx, in_rx) = mpsc::unbounded();
    let subscriber = registry
        .register(out_tx, in_rx)
        .await
        .expect("registration");
    (out_rx, in_tx, subscriber.id())
}

/// Envelopes received so far, without waiting
pub fn drain(outbound: &mut Outbound) -> Vec<EventEnvelope> {
    let mut envelopes = Vec::new();
    while let Some(Some(frame)) = outbound.next().now_or_never() {
        let text = frame.to_text().expect("text frame");
        envelopes.push(serde_json::from_str(text).expect("event envelope"));
    }
    envelopes
}
