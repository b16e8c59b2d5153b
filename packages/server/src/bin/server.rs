//! Multi-room WebSocket chat server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hubchat-server -- --port 8080 --users alice:secret,bob:hunter2
//! ```

use clap::Parser;
use hubchat_server::ServerConfig;
use hubchat_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    // Run the server
    if let Err(e) = hubchat_server::run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
