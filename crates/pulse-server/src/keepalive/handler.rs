//! Hand-off point for inbound application frames.

use axum::extract::ws::Message;
use tracing::info;

/// Receives application frames (text and binary) read by the liveness
/// reader. Control frames never reach it.
///
/// Called inline on the reader task, so implementations must not block.
pub trait InboundHandler: Send + Sync + 'static {
    /// Process one inbound frame from connection `conn_id`.
    fn on_message(&self, conn_id: &str, message: &Message);
}

/// Default handler: logs each payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingHandler;

impl InboundHandler for LoggingHandler {
    fn on_message(&self, conn_id: &str, message: &Message) {
        match message {
            Message::Text(text) => info!(conn_id, text = text.as_str(), "message received"),
            Message::Binary(data) => info!(conn_id, len = data.len(), "binary message received"),
            _ => {}
        }
    }
}

/// Whether a frame carries application data.
pub fn is_application(message: &Message) -> bool {
    matches!(message, Message::Text(_) | Message::Binary(_))
}

/// Payload length of a frame in bytes.
pub fn frame_len(message: &Message) -> usize {
    match message {
        Message::Text(text) => text.as_str().len(),
        Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data.len(),
        Message::Close(frame) => frame.as_ref().map_or(0, |f| 2 + f.reason.as_str().len()),
    }
}
