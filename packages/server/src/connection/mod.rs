//! Connection Pump: the inbound and outbound loops of one client.

pub mod client;
mod error;
pub mod pump;

pub use client::{Client, ConnectionState, DeliveryError, OutboundReceiver};
pub use error::ConnectionError;
pub use pump::{cleanup, read_loop, serve, write_loop};
