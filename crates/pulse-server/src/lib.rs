//! # pulse-server
//!
//! Axum HTTP + WebSocket server whose connections are kept alive by a
//! ping/pong heartbeat.
//!
//! - **`keepalive`**: per-connection reader and emitter tasks, the shared
//!   read deadline, and idempotent close
//! - **`server`**: routes (`/`, `/ws`, `/health`, `/metrics`) and the listener
//! - **`config`**: server configuration derived from `pulse-settings`
//! - **`shutdown`**: graceful listener shutdown
//! - **`metrics`**: Prometheus recorder and metric names

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod keepalive;
pub mod metrics;
pub mod page;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use errors::{KeepaliveError, ServerError};
pub use server::PulseServer;
