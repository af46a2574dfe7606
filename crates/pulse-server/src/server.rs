//! `PulseServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::errors::{KeepaliveError, ServerError};
use crate::health::{self, HealthResponse};
use crate::keepalive::{ActiveConnections, InboundHandler, LoggingHandler, attach};
use crate::metrics as names;
use crate::page;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Open connection count.
    pub active: ActiveConnections,
    /// Receives application frames from every connection.
    pub handler: Arc<dyn InboundHandler>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

/// The pulse server.
pub struct PulseServer {
    config: Arc<ServerConfig>,
    active: ActiveConnections,
    handler: Arc<dyn InboundHandler>,
    metrics: Option<PrometheusHandle>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl PulseServer {
    /// Create a new server that logs inbound messages.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            active: ActiveConnections::new(),
            handler: Arc::new(LoggingHandler),
            metrics: None,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Replace the inbound message handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn InboundHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: Arc::clone(&self.config),
            active: self.active.clone(),
            handler: Arc::clone(&self.handler),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/", get(index_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address and the serving task. The listener is bound
    /// exactly once.
    pub async fn listen(
        &self,
    ) -> Result<(SocketAddr, JoinHandle<Result<(), ServerError>>), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(%local_addr, "pulse server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
                .map_err(|source| ServerError::Serve {
                    addr: local_addr,
                    source,
                })?;
            info!(%local_addr, "pulse server stopped");
            Ok(())
        });

        Ok((local_addr, handle))
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the open connection count.
    pub fn active(&self) -> &ActiveConnections {
        &self.active
    }
}

/// GET / — host page pointing at this server's `/ws`.
async fn index_handler(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let fallback = state.config.addr();
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(&fallback);
    Html(page::render_index(host))
}

/// GET /ws — upgrade and hand the socket to the keepalive session.
async fn ws_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            record_handshake_failure(&KeepaliveError::HandshakeFailure(rejection.body_text()));
            return rejection.into_response();
        }
    };

    let keepalive = state.config.keepalive;
    let active = state.active.clone();
    let handler = Arc::clone(&state.handler);
    upgrade
        .read_buffer_size(state.config.read_buffer_size)
        .write_buffer_size(state.config.write_buffer_size)
        .max_message_size(keepalive.max_frame_bytes)
        .max_frame_size(keepalive.max_frame_bytes)
        .on_failed_upgrade(|err: axum::Error| {
            record_handshake_failure(&KeepaliveError::HandshakeFailure(err.to_string()));
        })
        .on_upgrade(move |socket| async move {
            drop(attach(socket, keepalive, active, handler));
        })
}

fn record_handshake_failure(err: &KeepaliveError) {
    warn!(error = %err, "websocket upgrade failed");
    counter!(names::HANDSHAKE_FAILURES_TOTAL).increment(1);
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.active.count()))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => names::render(handle).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
