//! In-memory transports for exercising the registry without sockets

use futures::channel::mpsc;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use std::io;
use std::time::Duration;
use trade_core::EventEnvelope;

use super::Frame;

pub(crate) type InboundStream = mpsc::UnboundedReceiver<Result<Frame, io::Error>>;

/// The client end of an in-memory subscriber transport
pub(crate) struct TestClient {
    outbound: Option<BoxStream<'static, Frame>>,
    inbound: Option<mpsc::UnboundedSender<Result<Frame, io::Error>>>,
}

impl TestClient {
    /// A transport whose write half never blocks
    pub(crate) fn connect() -> (Self, mpsc::UnboundedSender<Frame>, InboundStream) {
        let (out_tx, out_rx) = mpsc::unbounded();
        let (in_tx, in_rx) = mpsc::unbounded();
        (Self::new(out_rx.boxed(), in_tx), out_tx, in_rx)
    }

    /// A transport that accepts one frame and then blocks until the client reads
    pub(crate) fn connect_slow() -> (Self, mpsc::Sender<Frame>, InboundStream) {
        let (out_tx, out_rx) = mpsc::channel(0);
        let (in_tx, in_rx) = mpsc::unbounded();
        (Self::new(out_rx.boxed(), in_tx), out_tx, in_rx)
    }

    fn new(
        outbound: BoxStream<'static, Frame>,
        inbound: mpsc::UnboundedSender<Result<Frame, io::Error>>,
    ) -> Self {
        Self {
            outbound: Some(outbound),
            inbound: Some(inbound),
        }
    }

    /// Drop the receiving side so every further write fails
    pub(crate) fn break_outbound(mut self) -> Self {
        self.outbound = None;
        self
    }

    /// Send an inbound frame to the server
    pub(crate) fn send(&self, frame: Frame) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.unbounded_send(Ok(frame));
        }
    }

    /// Make the server's next read fail
    pub(crate) fn fail_read(&self) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.unbounded_send(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
    }

    /// Drop both halves, as if the socket vanished
    pub(crate) fn disconnect(&mut self) {
        self.outbound = None;
        self.inbound = None;
    }

    /// Frames received so far, without waiting
    pub(crate) fn received(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if let Some(outbound) = self.outbound.as_mut() {
            while let Some(Some(frame)) = outbound.next().now_or_never() {
                frames.push(frame);
            }
        }
        frames
    }

    /// Envelopes received so far, without waiting
    pub(crate) fn received_envelopes(&mut self) -> Vec<EventEnvelope> {
        self.received().iter().map(parse_envelope).collect()
    }

    /// Whether the server closed its write half (after draining pending frames)
    pub(crate) async fn is_closed(&mut self) -> bool {
        let Some(outbound) = self.outbound.as_mut() else {
            return true;
        };
        loop {
            match tokio::time::timeout(Duration::from_secs(2), outbound.next()).await {
                Ok(Some(_)) => continue,
                Ok(None) => return true,
                Err(_) => return false,
            }
        }
    }
}

pub(crate) fn parse_envelope(frame: &Frame) -> EventEnvelope {
    let text = frame.to_text().expect("text frame");
    serde_json::from_str(text).expect("event envelope")
}
