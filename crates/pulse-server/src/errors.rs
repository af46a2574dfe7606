//! Error types for the server and the keepalive core.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{CloseCode, close_code};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Why a keepalive session ended.
///
/// Every variant is terminal: the task that observes it closes the
/// connection and exits. Nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeepaliveError {
    /// Upgrade negotiation failed; the connection never entered the
    /// keepalive state machine.
    #[error("websocket handshake failed: {0}")]
    HandshakeFailure(String),
    /// No inbound frame or pong within the read window.
    #[error("no inbound activity within {window:?}")]
    ReceiveTimeout {
        /// The read window that lapsed.
        window: Duration,
    },
    /// An inbound frame exceeded the configured cap.
    #[error("inbound frame too large: {detail}")]
    FrameTooLarge {
        /// Size details as reported by whoever enforced the cap.
        detail: String,
    },
    /// Any other read or write failure on the transport.
    #[error("transport error: {0}")]
    Transport(String),
    /// A probe was not accepted within the write bound.
    #[error("probe not accepted within {timeout:?}")]
    SendTimeout {
        /// The per-send bound that lapsed.
        timeout: Duration,
    },
    /// The peer sent a Close frame or the inbound stream ended.
    #[error("peer closed the connection")]
    PeerClosed,
    /// The connection was already torn down by the other task.
    #[error("connection closed")]
    Closed,
}

impl KeepaliveError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HandshakeFailure(_) => "handshake_failure",
            Self::ReceiveTimeout { .. } => "receive_timeout",
            Self::FrameTooLarge { .. } => "frame_too_large",
            Self::Transport(_) => "transport_error",
            Self::SendTimeout { .. } => "send_timeout",
            Self::PeerClosed => "peer_closed",
            Self::Closed => "closed",
        }
    }

    /// Peer- or locally-initiated close rather than a failure.
    ///
    /// Only affects log level; teardown is identical either way.
    pub fn is_orderly(&self) -> bool {
        matches!(self, Self::PeerClosed | Self::Closed)
    }

    /// Close code sent to the peer when this error triggers teardown.
    pub fn close_code(&self) -> CloseCode {
        match self {
            Self::FrameTooLarge { .. } => close_code::SIZE,
            Self::ReceiveTimeout { .. } | Self::SendTimeout { .. } => close_code::AWAY,
            Self::Transport(_) | Self::HandshakeFailure(_) => close_code::ERROR,
            Self::PeerClosed | Self::Closed => close_code::NORMAL,
        }
    }
}

impl From<axum::Error> for KeepaliveError {
    fn from(err: axum::Error) -> Self {
        match err.into_inner().downcast::<tungstenite::Error>() {
            Ok(ws_err) => match *ws_err {
                tungstenite::Error::Capacity(capacity) => Self::FrameTooLarge {
                    detail: capacity.to_string(),
                },
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                    Self::PeerClosed
                }
                other => Self::Transport(other.to_string()),
            },
            Err(other) => Self::Transport(other.to_string()),
        }
    }
}

/// Errors from starting or running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address could not be parsed or bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address as configured.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The listener failed after binding.
    #[error("server error on {addr}: {source}")]
    Serve {
        /// Bound address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The Prometheus recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}
