//! Subscriber registry for WebSocket connections
//!
//! Owns the set of live subscribers. All mutation goes through
//! [`SubscriberRegistry::register`] and [`SubscriberRegistry::unregister`];
//! iteration goes through [`SubscriberRegistry::snapshot`].

use dashmap::DashMap;
use futures::future::poll_fn;
use futures::{Sink, SinkExt, Stream};
use parking_lot::Mutex;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::{ConnectionSetupError, DeliveryFailure};
use super::{monitor, Frame};

/// Default time allowed for a transport to become writable on registration
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for a close frame to be flushed when a subscriber is dropped
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type BoxedSink = Pin<Box<dyn Sink<Frame, Error = DeliveryFailure> + Send>>;

/// Write half of a transport with its errors mapped to [`DeliveryFailure`]
struct TransportSink<Si> {
    inner: Si,
}

impl<Si> Sink<Frame> for TransportSink<Si>
where
    Si: Sink<Frame> + Unpin,
    Si::Error: Display,
{
    type Error = DeliveryFailure;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_ready(cx).map_err(transport_error)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        Pin::new(&mut self.inner).start_send(item).map_err(transport_error)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_flush(cx).map_err(transport_error)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_close(cx).map_err(transport_error)
    }
}

fn transport_error(e: impl Display) -> DeliveryFailure {
    DeliveryFailure::Transport(e.to_string())
}

/// Unique identifier for a subscriber connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// Liveness of a subscriber
///
/// `Connecting -> Connected -> Disconnected`; `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Connecting,
    Connected,
    Disconnected,
}

/// Handle to one live streaming connection
///
/// The write half of the transport sits behind an async mutex so that only
/// one frame is ever in flight per connection.
pub struct Subscriber {
    id: SubscriberId,
    state: Mutex<SubscriberState>,
    sink: tokio::sync::Mutex<BoxedSink>,
    cancel: CancellationToken,
}

impl Subscriber {
    fn new(id: SubscriberId, sink: BoxedSink) -> Self {
        Self {
            id,
            state: Mutex::new(SubscriberState::Connecting),
            sink: tokio::sync::Mutex::new(sink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn state(&self) -> SubscriberState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SubscriberState::Connected
    }

    /// Resolves once the subscriber has been disconnected
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    /// Wait for the transport to accept a first frame
    async fn handshake(&self, timeout: Duration) -> Result<(), ConnectionSetupError> {
        let mut sink = self.sink.lock().await;

        match tokio::time::timeout(timeout, poll_fn(|cx| sink.as_mut().poll_ready(cx))).await {
            Ok(Ok(())) => {
                *self.state.lock() = SubscriberState::Connected;
                Ok(())
            }
            Ok(Err(e)) => Err(ConnectionSetupError::Handshake(e.to_string())),
            Err(_) => Err(ConnectionSetupError::Timeout(timeout)),
        }
    }

    /// Push one frame to the transport
    ///
    /// Waits behind any write already in flight. Aborts as soon as the
    /// subscriber is disconnected by someone else.
    pub(crate) async fn send(&self, frame: Frame, timeout: Duration) -> Result<(), DeliveryFailure> {
        let write = async {
            let mut sink = self.sink.lock().await;
            // Checked under the lock: once `shutdown` has run, nothing else is written
            if !self.is_connected() {
                return Err(DeliveryFailure::Closed);
            }
            sink.send(frame).await
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DeliveryFailure::Closed),
            result = tokio::time::timeout(timeout, write) => {
                result.unwrap_or(Err(DeliveryFailure::Timeout))
            }
        }
    }

    /// Move to `Disconnected` and close the transport
    ///
    /// Cancels the monitor task and any in-flight write, then waits for the
    /// write lock so no frame can follow. Safe to call more than once.
    async fn shutdown(&self) {
        self.cancel.cancel();

        let mut sink = self.sink.lock().await;
        let previous = std::mem::replace(&mut *self.state.lock(), SubscriberState::Disconnected);
        if previous != SubscriberState::Disconnected {
            if let Ok(Err(e)) = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
                debug!("Error closing transport for {}: {}", self.id, e);
            }
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

struct RegistryInner {
    /// Next subscriber ID to assign
    next_id: AtomicU64,
    /// Live subscribers by ID
    subscribers: DashMap<SubscriberId, Arc<Subscriber>>,
    handshake_timeout: Duration,
}

/// Authoritative set of live subscribers
///
/// Cheap to clone; every clone refers to the same set.
#[derive(Clone)]
pub struct SubscriberRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::with_handshake_timeout(DEFAULT_HANDSHAKE_TIMEOUT)
    }

    /// Create an empty registry with a custom handshake timeout
    pub fn with_handshake_timeout(handshake_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                next_id: AtomicU64::new(1),
                subscribers: DashMap::new(),
                handshake_timeout,
            }),
        }
    }

    /// Register a new subscriber
    ///
    /// Completes the handshake on `sink`, adds the subscriber to the live set
    /// and spawns a task that watches `stream` for disconnection. If the
    /// handshake fails the subscriber is never added.
    pub async fn register<Si, St, E>(
        &self,
        sink: Si,
        stream: St,
    ) -> Result<Arc<Subscriber>, ConnectionSetupError>
    where
        Si: Sink<Frame> + Send + Unpin + 'static,
        Si::Error: Display,
        St: Stream<Item = Result<Frame, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let sink: BoxedSink = Box::pin(TransportSink { inner: sink });
        let subscriber = Arc::new(Subscriber::new(id, sink));

        if let Err(e) = subscriber.handshake(self.inner.handshake_timeout).await {
            subscriber.shutdown().await;
            return Err(e);
        }

        self.inner.subscribers.insert(id, Arc::clone(&subscriber));
        info!("New subscriber connection: {}. Total connections: {}", id, self.len());

        monitor::spawn(self.clone(), Arc::clone(&subscriber), stream);

        Ok(subscriber)
    }

    /// Remove a subscriber from the live set
    ///
    /// Idempotent. Returns whether this call removed it. Once this returns the
    /// subscriber's transport is closed and it receives no further frames.
    pub async fn unregister(&self, subscriber: &Subscriber) -> bool {
        let removed = self.inner.subscribers.remove(&subscriber.id()).is_some();
        subscriber.shutdown().await;

        if removed {
            info!(
                "Subscriber {} disconnected. Remaining connections: {}",
                subscriber.id(),
                self.len()
            );
        }

        removed
    }

    /// Copy of the live set, safe to iterate while the registry changes
    pub fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.inner
            .subscribers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Check if a subscriber is currently registered
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.contains_key(&id)
    }

    /// Get the number of live subscribers
    pub fn len(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Check if there are no live subscribers
    pub fn is_empty(&self) -> bool {
        self.inner.subscribers.is_empty()
    }

    /// Disconnect every live subscriber (used on process shutdown)
    pub async fn close_all(&self) {
        let subscribers = self.snapshot();
        info!("Closing {} subscriber connections", subscribers.len());

        for subscriber in subscribers {
            self.unregister(&subscriber).await;
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("total_subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::test_transport::TestClient;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_register_adds_to_live_set() {
        let registry = SubscriberRegistry::new();
        assert!(registry.is_empty());

        let (_client, sink, stream) = TestClient::connect();
        let subscriber = registry.register(sink, stream).await.unwrap();

        assert_eq!(subscriber.state(), SubscriberState::Connected);
        assert!(registry.contains(subscriber.id()));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_registrations_get_unique_ids() {
        let registry = SubscriberRegistry::new();
        let mut clients = Vec::new();
        let mut tasks = Vec::new();

        for _ in 0..32 {
            let (client, sink, stream) = TestClient::connect();
            clients.push(client);
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.register(sink, stream).await.unwrap().id()
            }));
        }

        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap());
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 32);
        assert_eq!(ids.len(), 32);
        assert_eq!(
            snapshot.iter().map(|s| s.id()).collect::<HashSet<_>>(),
            ids
        );
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let (_a, sink_a, stream_a) = TestClient::connect();
        let (_b, sink_b, stream_b) = TestClient::connect();
        let a = registry.register(sink_a, stream_a).await.unwrap();
        registry.register(sink_b, stream_b).await.unwrap();

        assert!(registry.unregister(&a).await);
        assert_eq!(registry.len(), 1);

        assert!(!registry.unregister(&a).await);
        assert_eq!(registry.len(), 1);
        assert_eq!(a.state(), SubscriberState::Disconnected);
    }

    #[tokio::test]
    async fn test_unregister_closes_transport() {
        let registry = SubscriberRegistry::new();
        let (mut client, sink, stream) = TestClient::connect();
        let subscriber = registry.register(sink, stream).await.unwrap();

        registry.unregister(&subscriber).await;

        assert!(client.is_closed().await);
        assert!(subscriber
            .send(Frame::text("late"), Duration::from_secs(1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_failed_handshake_is_not_registered() {
        let registry = SubscriberRegistry::new();
        let (client, sink, stream) = TestClient::connect();
        let _client = client.break_outbound();

        let result = registry.register(sink, stream).await;

        assert!(matches!(result, Err(ConnectionSetupError::Handshake(_))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_stable_while_registry_changes() {
        let registry = SubscriberRegistry::new();
        let mut clients = Vec::new();
        for _ in 0..4 {
            let (client, sink, stream) = TestClient::connect();
            clients.push(client);
            registry.register(sink, stream).await.unwrap();
        }

        let snapshot = registry.snapshot();
        for subscriber in &snapshot {
            registry.unregister(subscriber).await;
            let (client, sink, stream) = TestClient::connect();
            clients.push(client);
            registry.register(sink, stream).await.unwrap();
        }

        assert_eq!(snapshot.len(), 4);
        assert_eq!(registry.len(), 4);
        assert!(snapshot.iter().all(|s| !registry.contains(s.id())));
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = SubscriberRegistry::new();
        let mut subscribers = Vec::new();
        let mut clients = Vec::new();
        for _ in 0..3 {
            let (client, sink, stream) = TestClient::connect();
            clients.push(client);
            subscribers.push(registry.register(sink, stream).await.unwrap());
        }

        registry.close_all().await;

        assert!(registry.is_empty());
        assert!(subscribers.iter().all(|s| !s.is_connected()));
    }
}
