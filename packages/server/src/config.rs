//! Server configuration.
//!
//! Every tunable is a CLI flag with an environment fallback. The core
//! components take the plain settings structs derived from it so they can be
//! constructed without going through clap.

use std::{collections::HashMap, time::Duration};

use clap::Parser;

/// Hubchat multi-room chat server
#[derive(Parser, Debug, Clone)]
#[command(name = "hubchat-server", version, about = "Multi-room WebSocket chat server")]
pub struct ServerConfig {
    /// Bind host
    #[arg(long, env = "HUBCHAT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Bind port
    #[arg(long, env = "HUBCHAT_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds a connection may stay silent before it is torn down
    #[arg(
        long,
        env = "HUBCHAT_PONG_WAIT_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub pong_wait_secs: u64,

    /// Maximum accepted inbound frame size in bytes
    #[arg(long, env = "HUBCHAT_MAX_MESSAGE_SIZE", default_value_t = 512)]
    pub max_message_size: usize,

    /// Capacity of each client's outbound queue
    #[arg(long, env = "HUBCHAT_OUTBOUND_QUEUE_CAPACITY", default_value_t = 256)]
    pub outbound_queue_capacity: usize,

    /// Seconds a one-time token stays valid
    #[arg(long, env = "HUBCHAT_TOKEN_RETENTION_SECS", default_value_t = 20)]
    pub token_retention_secs: u64,

    /// Milliseconds between token expiry sweeps
    #[arg(
        long,
        env = "HUBCHAT_TOKEN_SWEEP_INTERVAL_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub token_sweep_interval_ms: u64,

    /// Hub events that may wait in its queue before producers are held back
    #[arg(long, env = "HUBCHAT_HUB_QUEUE_CAPACITY", default_value_t = 1024)]
    pub hub_queue_capacity: usize,

    /// Messages replayed to a client when it joins a room
    #[arg(long, env = "HUBCHAT_HISTORY_LIMIT", default_value_t = 50)]
    pub history_limit: usize,

    /// Deliver a sender's own messages back to it
    #[arg(long, env = "HUBCHAT_ECHO_TO_SENDER")]
    pub echo_to_sender: bool,

    /// Create rooms lazily on the first join attempt
    #[arg(
        long,
        env = "HUBCHAT_AUTO_CREATE_ROOMS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub auto_create_rooms: bool,

    /// Login table as comma-separated `name:password` pairs
    #[arg(long, env = "HUBCHAT_USERS", value_delimiter = ',', default_value = "demo:demo")]
    pub users: Vec<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, env = "HUBCHAT_LOG", default_value = "info")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        // Parsing an empty argv yields the declared defaults.
        Self::parse_from(["hubchat-server"])
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings::new(
            Duration::from_secs(self.pong_wait_secs),
            self.max_message_size,
            self.outbound_queue_capacity,
        )
    }

    pub fn hub_settings(&self) -> HubSettings {
        HubSettings {
            history_limit: self.history_limit,
            echo_to_sender: self.echo_to_sender,
            event_queue_capacity: self.hub_queue_capacity,
        }
    }

    pub fn token_retention(&self) -> Duration {
        Duration::from_secs(self.token_retention_secs)
    }

    pub fn token_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.token_sweep_interval_ms)
    }

    /// Login table; malformed entries (no `:`) are skipped with a warning
    pub fn user_table(&self) -> HashMap<String, String> {
        self.users
            .iter()
            .filter_map(|entry| match entry.split_once(':') {
                Some((name, password)) if !name.is_empty() => {
                    Some((name.trim().to_string(), password.to_string()))
                }
                _ => {
                    tracing::warn!("Ignoring malformed user entry '{}'", entry);
                    None
                }
            })
            .collect()
    }
}

/// Liveness and framing limits for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub pong_wait: Duration,
    pub ping_interval: Duration,
    pub max_message_size: usize,
    pub outbound_queue_capacity: usize,
}

impl ConnectionSettings {
    /// `ping_interval` is derived as 9/10 of `pong_wait`, so more than one
    /// probe lands inside every liveness window.
    pub fn new(pong_wait: Duration, max_message_size: usize, outbound_queue_capacity: usize) -> Self {
        Self {
            pong_wait,
            ping_interval: pong_wait * 9 / 10,
            max_message_size,
            outbound_queue_capacity: outbound_queue_capacity.max(1),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), 512, 256)
    }
}

/// Hub dispatch policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSettings {
    pub history_limit: usize,
    pub echo_to_sender: bool,
    /// Bound of the hub's event queue
    pub event_queue_capacity: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            history_limit: 50,
            echo_to_sender: false,
            event_queue_capacity: 1024,
        }
    }
}
