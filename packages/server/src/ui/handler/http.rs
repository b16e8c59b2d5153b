//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    infrastructure::dto::http::{CreateRoomDto, LoginRequestDto, OneTimeTokenDto, RoomDetailDto},
    ui::state::AppState,
    usecase::{CreateRoomError, LoginError, RoomQueryError},
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Exchange username and password for a one-time connection token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequestDto>,
) -> Result<Json<OneTimeTokenDto>, StatusCode> {
    match state.login_usecase().execute(&body.username, &body.password).await {
        Ok(token) => Ok(Json(OneTimeTokenDto::from(&token))),
        Err(LoginError::InvalidCredentials) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Create a room. Creating an existing id returns the existing room.
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRoomDto>,
) -> Result<Json<CreateRoomDto>, StatusCode> {
    match state.create_room_usecase().execute(body.id, body.name).await {
        Ok(room) => Ok(Json(CreateRoomDto {
            id: room.id.into_string(),
            name: room.name,
        })),
        Err(CreateRoomError::InvalidRoomId(e)) => {
            tracing::warn!("Rejected room creation: {}", e);
            Err(StatusCode::BAD_REQUEST)
        }
        Err(CreateRoomError::HubUnavailable) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

/// Get list of rooms
pub async fn get_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RoomDetailDto>>, StatusCode> {
    let rooms = state
        .query_rooms_usecase()
        .list()
        .await
        .map_err(status_for_query_error)?;
    Ok(Json(rooms.iter().map(RoomDetailDto::from).collect()))
}

/// Get room detail by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    let room = state
        .query_rooms_usecase()
        .get(room_id)
        .await
        .map_err(status_for_query_error)?;
    Ok(Json(RoomDetailDto::from(&room)))
}

fn status_for_query_error(error: RoomQueryError) -> StatusCode {
    match error {
        RoomQueryError::RoomNotFound(_) => StatusCode::NOT_FOUND,
        RoomQueryError::HubUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}
