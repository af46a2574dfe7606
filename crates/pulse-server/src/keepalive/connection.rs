//! Per-connection state shared by the emitter and the reader.
//!
//! The connection owns the outbound half of the transport. Closing it is
//! the only coordination between the two tasks: whichever task fails first
//! closes it, and the other observes the close on its next (or current)
//! blocking operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use axum::extract::ws::{CloseFrame, Message};
use bytes::Bytes;
use futures::{Sink, SinkExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::KeepaliveConfig;
use crate::errors::KeepaliveError;
use crate::metrics as names;

/// Outbound half of a keepalive transport.
///
/// Implemented for any message sink whose error converts into
/// [`KeepaliveError`], including the write half of an axum `WebSocket`.
pub trait Outbound: Sink<Message, Error: Into<KeepaliveError>> + Unpin + Send + 'static {}

impl<T> Outbound for T where T: Sink<Message, Error: Into<KeepaliveError>> + Unpin + Send + 'static {}

/// Lifecycle of a connection. Moves forward only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Emitter and reader both running.
    Open,
    /// Teardown in progress.
    Closing,
    /// Transport released.
    Closed,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Which task is acting on the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The heartbeat emitter.
    Emitter,
    /// The liveness reader.
    Reader,
}

impl Role {
    /// Label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emitter => "emitter",
            Self::Reader => "reader",
        }
    }
}

/// Count of connections that have not yet reached [`ConnectionState::Closed`].
#[derive(Clone, Debug, Default)]
pub struct ActiveConnections(Arc<AtomicUsize>);

impl ActiveConnections {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of open connections.
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn opened(&self) {
        let _ = self.0.fetch_add(1, Ordering::Relaxed);
        gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
    }

    fn closed(&self) {
        let _ = self.0.fetch_sub(1, Ordering::Relaxed);
        gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
    }
}

/// One upgraded WebSocket session.
pub struct Connection<Tx> {
    id: String,
    config: KeepaliveConfig,
    outbound: Mutex<Option<Tx>>,
    state: AtomicU8,
    closed: CancellationToken,
    active: ActiveConnections,
    opened_at: Instant,
}

impl<Tx: Outbound> Connection<Tx> {
    /// Wrap the outbound half of a freshly upgraded transport.
    pub fn new(
        id: String,
        outbound: Tx,
        config: KeepaliveConfig,
        active: ActiveConnections,
    ) -> Self {
        active.opened();
        counter!(names::CONNECTIONS_TOTAL).increment(1);
        Self {
            id,
            config,
            outbound: Mutex::new(Some(outbound)),
            state: AtomicU8::new(0),
            closed: CancellationToken::new(),
            active,
            opened_at: Instant::now(),
        }
    }

    /// Connection id used in logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Keepalive settings for this connection.
    pub fn config(&self) -> &KeepaliveConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether teardown has started.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled when teardown starts. Blocking operations on either
    /// task select on it so they fail promptly once the transport is gone.
    pub fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Send a zero-payload ping, bounded by the write timeout.
    pub async fn send_probe(&self) -> Result<(), KeepaliveError> {
        self.send(Message::Ping(Bytes::new())).await?;
        counter!(names::PROBES_SENT_TOTAL).increment(1);
        debug!(conn_id = %self.id, "ping sent");
        Ok(())
    }

    /// Send one frame. Fails with [`KeepaliveError::SendTimeout`] after the
    /// write timeout and with [`KeepaliveError::Closed`] as soon as the
    /// connection is closed, even mid-send.
    pub async fn send(&self, message: Message) -> Result<(), KeepaliveError> {
        if self.is_closed() {
            return Err(KeepaliveError::Closed);
        }
        let write = async {
            let mut outbound = self.outbound.lock().await;
            let sink = outbound.as_mut().ok_or(KeepaliveError::Closed)?;
            sink.send(message).await.map_err(Into::into)
        };
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(KeepaliveError::Closed),
            result = timeout(self.config.write_timeout, write) => result.unwrap_or(Err(
                KeepaliveError::SendTimeout { timeout: self.config.write_timeout },
            )),
        }
    }

    /// Tear down the transport. Safe to call any number of times from
    /// either task; only the first call does anything and returns `true`.
    pub async fn close(&self, by: Role, reason: &KeepaliveError) -> bool {
        if self
            .state
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(conn_id = %self.id, by = by.as_str(), "already closed");
            return false;
        }
        self.closed.cancel();

        let sink = self.outbound.lock().await.take();
        if let Some(mut sink) = sink {
            let frame = Message::Close(Some(CloseFrame {
                code: reason.close_code(),
                reason: "".into(),
            }));
            let shutdown = async {
                let _ = sink.send(frame).await;
                let _ = sink.close().await;
            };
            if timeout(self.config.write_timeout, shutdown).await.is_err() {
                debug!(conn_id = %self.id, "close frame not flushed before write timeout");
            }
        }
        self.state.store(2, Ordering::Release);
        self.active.closed();

        let lifetime = self.opened_at.elapsed();
        counter!(names::DISCONNECTIONS_TOTAL, "reason" => reason.kind()).increment(1);
        histogram!(names::CONNECTION_DURATION_SECONDS).record(lifetime.as_secs_f64());
        if reason.is_orderly() {
            info!(conn_id = %self.id, by = by.as_str(), %reason, ?lifetime, "connection closed");
        } else {
            warn!(conn_id = %self.id, by = by.as_str(), %reason, ?lifetime, "connection closed");
        }
        true
    }
}
