//! Multi-room WebSocket chat server.
//!
//! A single hub task owns every room and serializes joins, leaves and
//! broadcasts. Each connection runs an inbound and an outbound loop with
//! ping/pong liveness, and connections are authorized with single-use,
//! time-bounded tokens issued by the login endpoint.

pub mod common;
pub mod config;
pub mod connection;
pub mod domain;
pub mod hub;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// Re-export entry points
pub use config::ServerConfig;
pub use ui::{ServerError, run};
