//! Heartbeat emitter: the outbound half of a keepalive session.
//!
//! Sends a zero-payload ping as soon as the session starts and then every
//! `heartbeat_period` (9/10 of the read window). Never reads and never
//! touches the read deadline.

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use tokio::time::{self, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tracing::debug;

use super::connection::{Connection, Outbound, Role};
use super::session::CloseGuard;
use crate::errors::KeepaliveError;

/// Run the emitter task for `conn` until a send fails or the connection is
/// closed, then close the connection. Returns the reason.
pub async fn run_emitter<Tx: Outbound>(conn: Arc<Connection<Tx>>) -> KeepaliveError {
    let guard = CloseGuard::new(Arc::clone(&conn), Role::Emitter);
    let period = conn.config().heartbeat_period();
    debug!(?period, "emitter started");

    // First tick is immediate: the peer gets a full window to answer it.
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let closed = conn.close_signal();
    let outcome = IntervalStream::new(ticker)
        .take_until(closed.cancelled())
        .map(Ok::<_, KeepaliveError>)
        .try_for_each(|_| conn.send_probe())
        .await;

    // A clean end means the ticker was cut short by a close from the reader.
    let reason = outcome.err().unwrap_or(KeepaliveError::Closed);
    debug!(%reason, "emitter stopped");
    let _ = guard.release(&reason).await;
    reason
}
