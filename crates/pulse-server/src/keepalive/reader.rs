//! Liveness reader: the inbound half of a keepalive session.
//!
//! Reads frames until the first terminal condition. Every inbound frame
//! (application data, ping or pong) re-arms the read deadline; nothing
//! outbound does. A read that sees no frame before the deadline fails with
//! [`KeepaliveError::ReceiveTimeout`].

use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt, TryStreamExt, future, stream};
use metrics::counter;
use tokio::time::timeout_at;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::config::KeepaliveConfig;
use super::connection::{Connection, Outbound, Role};
use super::deadline::ReadDeadline;
use super::handler::{InboundHandler, frame_len, is_application};
use super::session::CloseGuard;
use crate::errors::KeepaliveError;
use crate::metrics as names;

/// Inbound half of a transport paired with its read deadline.
pub struct LivenessReader<Rx> {
    inbound: Rx,
    deadline: ReadDeadline,
    config: KeepaliveConfig,
    closed: CancellationToken,
}

impl<Rx, E> LivenessReader<Rx>
where
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Into<KeepaliveError>,
{
    /// Wrap `inbound` and arm the initial deadline.
    ///
    /// `closed` is the connection's close signal; a pending read fails with
    /// [`KeepaliveError::Closed`] as soon as it fires.
    pub fn new(inbound: Rx, config: KeepaliveConfig, closed: CancellationToken) -> Self {
        Self {
            inbound,
            deadline: ReadDeadline::new(config.window),
            config,
            closed,
        }
    }

    /// Current read deadline.
    pub fn deadline(&self) -> tokio::time::Instant {
        self.deadline.instant()
    }

    /// Block until the next frame, the deadline, or connection close.
    pub async fn next_frame(&mut self) -> Result<Message, KeepaliveError> {
        let received = tokio::select! {
            biased;
            () = self.closed.cancelled() => return Err(KeepaliveError::Closed),
            received = timeout_at(self.deadline.instant(), self.inbound.next()) => received,
        };
        let frame = match received {
            Err(_elapsed) => {
                return Err(KeepaliveError::ReceiveTimeout {
                    window: self.config.window,
                });
            }
            Ok(None) => return Err(KeepaliveError::PeerClosed),
            Ok(Some(Err(err))) => return Err(err.into()),
            Ok(Some(Ok(frame))) => frame,
        };

        let size = frame_len(&frame);
        if size > self.config.max_frame_bytes {
            return Err(KeepaliveError::FrameTooLarge {
                detail: format!("{size} > {} bytes", self.config.max_frame_bytes),
            });
        }

        match frame {
            Message::Close(_) => Err(KeepaliveError::PeerClosed),
            Message::Pong(_) => {
                self.on_pong();
                Ok(frame)
            }
            _ => {
                self.deadline.arm(self.config.window);
                Ok(frame)
            }
        }
    }

    /// Control-reply handler: re-arm and return. Never reads.
    fn on_pong(&mut self) {
        self.deadline.arm(self.config.window);
        counter!(names::PONGS_RECEIVED_TOTAL).increment(1);
        trace!("pong received");
    }

    /// Turn the reader into a stream of frames that ends with the first
    /// terminal error.
    pub fn frames(self) -> impl Stream<Item = Result<Message, KeepaliveError>> {
        stream::try_unfold(self, |mut reader| async move {
            let frame = reader.next_frame().await?;
            Ok::<_, KeepaliveError>(Some((frame, reader)))
        })
    }
}

/// Run the reader task for `conn` until the first terminal condition, then
/// close the connection. Returns the reason.
pub async fn run_reader<Tx, Rx, E>(
    conn: Arc<Connection<Tx>>,
    inbound: Rx,
    handler: Arc<dyn InboundHandler>,
) -> KeepaliveError
where
    Tx: Outbound,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Into<KeepaliveError>,
{
    let guard = CloseGuard::new(Arc::clone(&conn), Role::Reader);
    debug!("reader started");

    let reader = LivenessReader::new(inbound, *conn.config(), conn.close_signal());
    let outcome = reader
        .frames()
        .try_for_each(|frame| {
            if is_application(&frame) {
                handler.on_message(conn.id(), &frame);
            }
            future::ready(Ok(()))
        })
        .await;

    let reason = outcome.err().unwrap_or(KeepaliveError::PeerClosed);
    debug!(%reason, "reader stopped");
    let _ = guard.release(&reason).await;
    reason
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;
    use crate::keepalive::connection::{ActiveConnections, ConnectionState};
    use crate::keepalive::testing::{RecordingSink, inbound, test_config};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl InboundHandler for Recorder {
        fn on_message(&self, _conn_id: &str, message: &Message) {
            if let Message::Text(text) = message {
                self.0.lock().push(text.as_str().to_owned());
            }
        }
    }

    fn connection() -> Arc<Connection<RecordingSink>> {
        Arc::new(Connection::new(
            "reader_test".into(),
            RecordingSink::new(),
            test_config(),
            ActiveConnections::new(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out_at_window() {
        let (_tx, rx) = inbound();
        let mut reader = LivenessReader::new(rx, test_config(), CancellationToken::new());
        let start = Instant::now();

        let err = reader.next_frame().await.unwrap_err();

        assert_eq!(
            err,
            KeepaliveError::ReceiveTimeout {
                window: Duration::from_secs(5)
            }
        );
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn pong_rearms_deadline() {
        let (tx, rx) = inbound();
        let mut reader = LivenessReader::new(rx, test_config(), CancellationToken::new());
        let start = Instant::now();

        tokio::time::advance(Duration::from_secs(4)).await;
        tx.unbounded_send(Ok(Message::Pong(Bytes::new()))).unwrap();
        assert_matches!(reader.next_frame().await, Ok(Message::Pong(_)));
        assert_eq!(reader.deadline(), start + Duration::from_secs(9));

        let err = reader.next_frame().await.unwrap_err();
        assert_matches!(err, KeepaliveError::ReceiveTimeout { .. });
        assert_eq!(start.elapsed(), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn application_message_rearms_deadline() {
        let (tx, rx) = inbound();
        let mut reader = LivenessReader::new(rx, test_config(), CancellationToken::new());
        let start = Instant::now();

        tokio::time::advance(Duration::from_secs(3)).await;
        tx.unbounded_send(Ok(Message::Text("hello".into()))).unwrap();
        let _ = reader.next_frame().await.unwrap();
        assert_eq!(reader.deadline(), start + Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_frame_fails_immediately() {
        let (tx, rx) = inbound();
        let mut reader = LivenessReader::new(rx, test_config(), CancellationToken::new());
        let start = Instant::now();

        tx.unbounded_send(Ok(Message::Text("x".repeat(513).into()))).unwrap();
        let err = reader.next_frame().await.unwrap_err();

        assert_matches!(err, KeepaliveError::FrameTooLarge { ref detail } if detail == "513 > 512 bytes");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn frame_at_cap_is_accepted() {
        let (tx, rx) = inbound();
        let mut reader = LivenessReader::new(rx, test_config(), CancellationToken::new());
        tx.unbounded_send(Ok(Message::Binary(Bytes::from(vec![7u8; 512]))))
            .unwrap();
        assert_matches!(reader.next_frame().await, Ok(Message::Binary(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn close_frame_and_end_of_stream_are_peer_closed() {
        let (tx, rx) = inbound();
        let mut reader = LivenessReader::new(rx, test_config(), CancellationToken::new());
        tx.unbounded_send(Ok(Message::Close(None))).unwrap();
        assert_eq!(reader.next_frame().await, Err(KeepaliveError::PeerClosed));

        let (tx, rx) = inbound();
        drop(tx);
        let mut reader = LivenessReader::new(rx, test_config(), CancellationToken::new());
        assert_eq!(reader.next_frame().await, Err(KeepaliveError::PeerClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_terminal() {
        let (tx, rx) = inbound();
        let mut reader = LivenessReader::new(rx, test_config(), CancellationToken::new());
        tx.unbounded_send(Err(KeepaliveError::Transport("reset".into())))
            .unwrap();
        assert_eq!(
            reader.next_frame().await,
            Err(KeepaliveError::Transport("reset".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn close_signal_interrupts_pending_read() {
        let (_tx, rx) = inbound();
        let closed = CancellationToken::new();
        let mut reader = LivenessReader::new(rx, test_config(), closed.clone());
        let start = Instant::now();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            closed.cancel();
        });

        assert_eq!(reader.next_frame().await, Err(KeepaliveError::Closed));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        canceller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn frames_stream_ends_after_first_error() {
        let (tx, rx) = inbound();
        let reader = LivenessReader::new(rx, test_config(), CancellationToken::new());
        tx.unbounded_send(Ok(Message::Text("a".into()))).unwrap();
        tx.unbounded_send(Ok(Message::Close(None))).unwrap();
        tx.unbounded_send(Ok(Message::Text("never".into()))).unwrap();

        let collected: Vec<_> = reader.frames().collect().await;
        assert_eq!(collected.len(), 2);
        assert_matches!(&collected[0], Ok(Message::Text(t)) if t.as_str() == "a");
        assert_eq!(collected[1], Err(KeepaliveError::PeerClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn run_reader_hands_off_messages_and_closes() {
        let conn = connection();
        let recorder = Arc::new(Recorder::default());
        let (tx, rx) = inbound();
        tx.unbounded_send(Ok(Message::Text("one".into()))).unwrap();
        tx.unbounded_send(Ok(Message::Pong(Bytes::new()))).unwrap();
        tx.unbounded_send(Ok(Message::Text("two".into()))).unwrap();
        tx.unbounded_send(Ok(Message::Close(None))).unwrap();

        let reason = run_reader(Arc::clone(&conn), rx, recorder.clone()).await;

        assert_eq!(reason, KeepaliveError::PeerClosed);
        assert_eq!(*recorder.0.lock(), vec!["one".to_string(), "two".to_string()]);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_frame_is_not_handed_off() {
        let conn = connection();
        let recorder = Arc::new(Recorder::default());
        let (tx, rx) = inbound();
        tx.unbounded_send(Ok(Message::Text("y".repeat(600).into()))).unwrap();
        tx.unbounded_send(Ok(Message::Text("after".into()))).unwrap();

        let reason = run_reader(Arc::clone(&conn), rx, recorder.clone()).await;

        assert_matches!(reason, KeepaliveError::FrameTooLarge { .. });
        assert!(recorder.0.lock().is_empty());
        assert!(conn.is_closed());
    }
}
