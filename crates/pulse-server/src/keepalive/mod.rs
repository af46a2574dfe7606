//! Ping/pong connection keepalive.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `config` | Read window, write bound, frame cap; derived heartbeat period |
//! | `deadline` | Read deadline owned by the reader |
//! | `connection` | Shared outbound half, lifecycle state, idempotent close |
//! | `reader` | Inbound loop: re-arms on activity, fails on timeout or oversize |
//! | `emitter` | Outbound loop: one ping per heartbeat period |
//! | `session` | Spawns both tasks; close-on-exit guard |
//! | `handler` | Hand-off for application frames |

pub mod config;
pub mod connection;
pub mod deadline;
pub mod emitter;
pub mod handler;
pub mod reader;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use config::KeepaliveConfig;
pub use connection::{ActiveConnections, Connection, ConnectionState, Outbound, Role};
pub use handler::{InboundHandler, LoggingHandler};
pub use session::{CloseGuard, SessionTasks, attach, spawn_session};
