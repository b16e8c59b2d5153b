//! Utilities shared across layers.

pub mod shutdown;
pub mod time;

pub use shutdown::{Shutdown, ShutdownSignal};
