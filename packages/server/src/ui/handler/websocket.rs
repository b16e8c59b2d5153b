//! WebSocket connection handler.
//!
//! Authorization and room registration happen before the upgrade, so a
//! rejected client gets a plain HTTP status instead of a socket.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::stream::StreamExt;
use serde::Deserialize;

use crate::{
    connection,
    ui::state::AppState,
    usecase::{JoinError, JoinRequest},
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub otp: Option<String>,
    #[serde(default)]
    pub user_id: String,
    pub username: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let request = JoinRequest {
        room_id,
        otp: query.otp,
        user_id: query.user_id,
        username: query.username,
    };

    let (client, outbound) = match state.join_room_usecase().execute(request).await {
        Ok(joined) => joined,
        Err(e) => {
            tracing::warn!("Rejecting WebSocket connection: {}", e);
            return Err(status_for_join_error(&e));
        }
    };

    let settings = state.connection;
    let hub = state.hub.clone();
    let (failed_client, failed_hub) = (client.clone(), hub.clone());

    Ok(ws
        .max_message_size(settings.max_message_size)
        .on_failed_upgrade(move |error| {
            tracing::warn!(client_id = %failed_client.id(), "WebSocket upgrade failed: {}", error);
            tokio::spawn(async move {
                connection::cleanup(&failed_client, &failed_hub).await;
            });
        })
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            connection::serve(sink, stream, client, outbound, hub, settings).await;
        }))
}

fn status_for_join_error(error: &JoinError) -> StatusCode {
    match error {
        JoinError::Unauthorized => StatusCode::UNAUTHORIZED,
        JoinError::InvalidClientId(_) | JoinError::InvalidRoomId(_) => StatusCode::BAD_REQUEST,
        JoinError::RoomNotFound(_) => StatusCode::NOT_FOUND,
        JoinError::DuplicateClientId(_) => StatusCode::CONFLICT,
        JoinError::HubUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}
