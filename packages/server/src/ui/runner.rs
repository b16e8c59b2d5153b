//! Server assembly: hub, credential sweep and the axum router.

use std::{future::Future, io, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    common::Shutdown,
    config::ServerConfig,
    hub::Hub,
    infrastructure::{credential::CredentialStore, repository::InMemoryMessageRepository},
    ui::{handler, signal::shutdown_signal, state::AppState},
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] io::Error),
}

/// Build the router over prepared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handler::health_check))
        .route("/api/login", post(handler::login))
        .route("/api/rooms", get(handler::get_rooms).post(handler::create_room))
        .route("/api/rooms/{room_id}", get(handler::get_room_detail))
        .route("/ws/rooms/{room_id}", get(handler::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to the configured address and serve until Ctrl+C / SIGTERM
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    serve(listener, config, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// The hub and the expiry sweep are started here and stopped after the
/// listener has drained.
pub async fn serve<F>(listener: TcpListener, config: ServerConfig, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let background = Shutdown::new();

    let repository = Arc::new(InMemoryMessageRepository::new());
    let (hub, hub_task) = Hub::spawn(repository, config.hub_settings(), background.signal());

    let credentials = Arc::new(CredentialStore::new(config.token_retention()));
    let sweep_task =
        credentials.spawn_expiry_sweep(config.token_sweep_interval(), background.signal());

    let state = Arc::new(AppState {
        hub,
        credentials,
        users: Arc::new(config.user_table()),
        connection: config.connection_settings(),
        auto_create_rooms: config.auto_create_rooms,
    });

    if let Ok(local) = listener.local_addr() {
        tracing::info!("Listening on {}", local);
    }

    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await;

    tracing::info!("Shutting down background tasks");
    background.trigger();
    if let Err(e) = hub_task.await {
        tracing::error!("Hub task failed: {}", e);
    }
    if let Err(e) = sweep_task.await {
        tracing::error!("Token sweep task failed: {}", e);
    }

    result.map_err(ServerError::from)
}
