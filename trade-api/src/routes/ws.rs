//! WebSocket route handler
//!
//! Each upgraded socket becomes a subscriber of the order feed. The socket
//! speaks axum's message type; the feed speaks tungstenite frames, so both
//! halves are adapted here before registration.

use axum::{
    body::Bytes,
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame as FeedCloseFrame};
use trade_services::Frame;
use tracing::{debug, info, warn};

use crate::AppState;

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/ws-test", get(ws_status))
}

/// Response for the WebSocket status probe
#[derive(Debug, Serialize)]
struct WsStatusResponse {
    status: String,
    active_connections: usize,
    host: String,
}

async fn ws_status(State(state): State<AppState>) -> Json<WsStatusResponse> {
    Json(WsStatusResponse {
        status: "WebSocket endpoint is running".to_string(),
        active_connections: state.registry().len(),
        host: state
            .public_host
            .clone()
            .unwrap_or_else(|| "not set".to_string()),
    })
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket upgrade request received");
    ws.on_failed_upgrade(|e| warn!("WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Register an established connection and hold it until it is removed
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    let inbound = receiver.map(|msg| msg.map(into_frame));

    match state.registry().register(SocketSink(sender), inbound).await {
        Ok(subscriber) => {
            subscriber.closed().await;
            debug!("WebSocket connection {} finished", subscriber.id());
        }
        Err(e) => warn!("WebSocket connection was not registered: {}", e),
    }
}

/// Write half of an axum socket accepting feed frames
struct SocketSink(SplitSink<WebSocket, Message>);

impl Sink<Frame> for SocketSink {
    type Error = axum::Error;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.poll_ready_unpin(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        match into_message(item) {
            Some(message) => self.0.start_send_unpin(message),
            None => Ok(()),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.poll_flush_unpin(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.poll_close_unpin(cx)
    }
}

/// Convert an outbound feed frame; raw frames have no axum equivalent
fn into_message(frame: Frame) -> Option<Message> {
    let message = match frame {
        Frame::Text(text) => Message::Text(text.to_string().into()),
        Frame::Binary(data) => Message::Binary(Bytes::from(data.to_vec())),
        Frame::Ping(data) => Message::Ping(Bytes::from(data.to_vec())),
        Frame::Pong(data) => Message::Pong(Bytes::from(data.to_vec())),
        Frame::Close(close) => Message::Close(close.map(|close| CloseFrame {
            code: close.code.into(),
            reason: close.reason.to_string().into(),
        })),
        Frame::Frame(_) => return None,
    };
    Some(message)
}

fn into_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.to_string().into()),
        Message::Binary(data) => Frame::Binary(data.to_vec().into()),
        Message::Ping(data) => Frame::Ping(data.to_vec().into()),
        Message::Pong(data) => Frame::Pong(data.to_vec().into()),
        Message::Close(close) => Frame::Close(close.map(|close| FeedCloseFrame {
            code: CloseCode::from(close.code),
            reason: close.reason.to_string().into(),
        })),
    }
}
