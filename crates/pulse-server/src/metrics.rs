//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Connections opened (counter).
pub const CONNECTIONS_TOTAL: &str = "keepalive_connections_total";
/// Connections not yet closed (gauge).
pub const CONNECTIONS_ACTIVE: &str = "keepalive_connections_active";
/// Connections closed (counter, labels: reason).
pub const DISCONNECTIONS_TOTAL: &str = "keepalive_disconnections_total";
/// Connection lifetime (histogram).
pub const CONNECTION_DURATION_SECONDS: &str = "keepalive_connection_duration_seconds";
/// Pings sent (counter).
pub const PROBES_SENT_TOTAL: &str = "keepalive_probes_sent_total";
/// Pongs received (counter).
pub const PONGS_RECEIVED_TOTAL: &str = "keepalive_pongs_received_total";
/// Upgrade requests that never became a connection (counter).
pub const HANDSHAKE_FAILURES_TOTAL: &str = "keepalive_handshake_failures_total";
