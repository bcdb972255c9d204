//! Connection lifecycle monitor
//!
//! Each subscriber gets one task that owns the read half of its transport.
//! Inbound data carries no meaning for the order feed and is discarded; a
//! read error, a close frame or the end of the stream unregisters the
//! subscriber.

use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

use super::registry::{Subscriber, SubscriberRegistry};
use super::Frame;

/// Spawn the monitor task for a freshly registered subscriber
///
/// The task ends when the transport closes or when the subscriber is
/// unregistered by anyone else, whichever comes first.
pub(crate) fn spawn<St, E>(
    registry: SubscriberRegistry,
    subscriber: Arc<Subscriber>,
    stream: St,
) where
    St: Stream<Item = Result<Frame, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(watch_connection(registry, subscriber, stream));
}

async fn watch_connection<St, E>(
    registry: SubscriberRegistry,
    subscriber: Arc<Subscriber>,
    stream: St,
) where
    St: Stream<Item = Result<Frame, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let id = subscriber.id();
    let mut stream = Box::pin(stream);

    loop {
        tokio::select! {
            _ = subscriber.closed() => {
                debug!("Monitor for {} stopped: subscriber already removed", id);
                return;
            }
            next = stream.next() => match next {
                Some(Ok(Frame::Close(frame))) => {
                    debug!("Received close from {}: {:?}", id, frame);
                    break;
                }
                Some(Ok(Frame::Ping(_) | Frame::Pong(_))) => {
                    // Handled by the transport
                }
                Some(Ok(_)) => {
                    debug!("Discarding inbound message from {}", id);
                }
                Some(Err(e)) => {
                    debug!("WebSocket error for {}: {}", id, e);
                    break;
                }
                None => {
                    debug!("Stream ended for {}", id);
                    break;
                }
            }
        }
    }

    registry.unregister(&subscriber).await;
}
