//! Session wiring: one connection, two independently scheduled tasks.
//!
//! The emitter and the reader share only the [`Connection`]. Each holds a
//! [`CloseGuard`], so the connection is released on every exit path of
//! either task, including abort and panic. There is no join barrier.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span};

use super::config::KeepaliveConfig;
use super::connection::{ActiveConnections, Connection, ConnectionState, Outbound, Role};
use super::emitter::run_emitter;
use super::handler::InboundHandler;
use super::reader::run_reader;
use crate::errors::KeepaliveError;

/// Releases the connection when a task exits.
///
/// Call [`CloseGuard::release`] on the normal exit path. If the guard is
/// dropped while the connection is still open (task aborted or panicked),
/// the close is spawned onto the current runtime instead.
pub struct CloseGuard<Tx: Outbound> {
    conn: Option<Arc<Connection<Tx>>>,
    role: Role,
}

impl<Tx: Outbound> CloseGuard<Tx> {
    /// Guard `conn` on behalf of `role`.
    pub fn new(conn: Arc<Connection<Tx>>, role: Role) -> Self {
        Self {
            conn: Some(conn),
            role,
        }
    }

    /// Close the connection with `reason`. Returns `true` if this call did
    /// the teardown.
    pub async fn release(mut self, reason: &KeepaliveError) -> bool {
        match self.conn.take() {
            Some(conn) => conn.close(self.role, reason).await,
            None => false,
        }
    }
}

impl<Tx: Outbound> Drop for CloseGuard<Tx> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if conn.state() != ConnectionState::Open {
            return;
        }
        let role = self.role;
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            drop(runtime.spawn(async move {
                let _ = conn
                    .close(role, &KeepaliveError::Transport(format!("{} task ended", role.as_str())))
                    .await;
            }));
        }
    }
}

/// Handles to the two tasks of one session.
pub struct SessionTasks {
    /// Heartbeat emitter; resolves to its exit reason.
    pub emitter: JoinHandle<KeepaliveError>,
    /// Liveness reader; resolves to its exit reason.
    pub reader: JoinHandle<KeepaliveError>,
}

/// Start the emitter and the reader for one transport.
///
/// Both tasks start immediately and run until the connection dies.
pub fn spawn_session<Tx, Rx, E>(
    id: String,
    outbound: Tx,
    inbound: Rx,
    config: KeepaliveConfig,
    active: ActiveConnections,
    handler: Arc<dyn InboundHandler>,
) -> (Arc<Connection<Tx>>, SessionTasks)
where
    Tx: Outbound,
    Rx: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Into<KeepaliveError> + Send + 'static,
{
    let conn = Arc::new(Connection::new(id, outbound, config, active));
    info!(
        conn_id = conn.id(),
        window = ?config.window,
        period = ?config.heartbeat_period(),
        "connection opened"
    );

    let emitter = tokio::spawn(
        run_emitter(Arc::clone(&conn))
            .instrument(info_span!("emitter", conn_id = %conn.id())),
    );
    let reader = tokio::spawn(
        run_reader(Arc::clone(&conn), inbound, handler)
            .instrument(info_span!("reader", conn_id = %conn.id())),
    );

    (conn, SessionTasks { emitter, reader })
}

/// Start a session on an upgraded axum WebSocket.
pub fn attach(
    socket: WebSocket,
    config: KeepaliveConfig,
    active: ActiveConnections,
    handler: Arc<dyn InboundHandler>,
) -> SessionTasks {
    let id = format!("conn_{}", uuid::Uuid::now_v7());
    let (outbound, inbound) = socket.split();
    let (_conn, tasks) = spawn_session(id, outbound, inbound, config, active, handler);
    tasks
}
