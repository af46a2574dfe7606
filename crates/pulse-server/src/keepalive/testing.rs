//! In-memory transports for driving the keepalive tasks under a paused clock.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::ws::Message;
use futures::Sink;
use futures::channel::mpsc;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::config::KeepaliveConfig;
use crate::errors::KeepaliveError;

/// Window 5s, write timeout 10s, cap 512 bytes: the reference timings.
pub(crate) fn test_config() -> KeepaliveConfig {
    KeepaliveConfig {
        window: Duration::from_secs(5),
        write_timeout: Duration::from_secs(10),
        max_frame_bytes: 512,
    }
}

/// Inbound half: a channel of frames the test pushes into.
pub(crate) type InboundTx = mpsc::UnboundedSender<Result<Message, KeepaliveError>>;
pub(crate) type InboundRx = mpsc::UnboundedReceiver<Result<Message, KeepaliveError>>;

pub(crate) fn inbound() -> (InboundTx, InboundRx) {
    mpsc::unbounded()
}

#[derive(Clone, Copy)]
enum Mode {
    Accept,
    Stall,
    Fail(&'static str),
}

#[derive(Default)]
struct Record {
    sent: Vec<(Instant, Message)>,
    closed: bool,
}

/// Outbound half that records every frame with its (virtual) send time.
#[derive(Clone)]
pub(crate) struct RecordingSink {
    mode: Mode,
    record: Arc<Mutex<Record>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::with_mode(Mode::Accept)
    }

    /// Never becomes ready, like a peer that stopped reading.
    pub(crate) fn stalled() -> Self {
        Self::with_mode(Mode::Stall)
    }

    pub(crate) fn failing(reason: &'static str) -> Self {
        Self::with_mode(Mode::Fail(reason))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            record: Arc::new(Mutex::new(Record::default())),
        }
    }

    pub(crate) fn messages(&self) -> Vec<Message> {
        self.record.lock().sent.iter().map(|(_, m)| m.clone()).collect()
    }

    /// Send times of every ping, in order.
    pub(crate) fn ping_times(&self) -> Vec<Instant> {
        self.record
            .lock()
            .sent
            .iter()
            .filter(|(_, m)| matches!(m, Message::Ping(_)))
            .map(|(at, _)| *at)
            .collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.record.lock().closed
    }
}

impl Sink<Message> for RecordingSink {
    type Error = KeepaliveError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.mode {
            Mode::Accept => Poll::Ready(Ok(())),
            Mode::Stall => Poll::Pending,
            Mode::Fail(reason) => Poll::Ready(Err(KeepaliveError::Transport(reason.into()))),
        }
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.record.lock().sent.push((Instant::now(), item));
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.record.lock().closed = true;
        Poll::Ready(Ok(()))
    }
}
