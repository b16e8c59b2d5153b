//! HTTP API request/response DTOs for the chat application.

use serde::{Deserialize, Serialize};

use crate::domain::{OneTimeToken, RoomSnapshot};

/// Login request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequestDto {
    pub username: String,
    pub password: String,
}

/// One-time token returned by a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeTokenDto {
    pub key: String,
    /// Unix timestamp (milliseconds) in JST
    pub created_at: i64,
}

impl From<&OneTimeToken> for OneTimeTokenDto {
    fn from(token: &OneTimeToken) -> Self {
        Self {
            key: token.key.clone(),
            created_at: token.created_at.value(),
        }
    }
}

/// Room creation request body, echoed back on success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomDto {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Room with its current members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub id: String,
    pub name: String,
    pub members: Vec<String>,
}

impl From<&RoomSnapshot> for RoomDetailDto {
    fn from(snapshot: &RoomSnapshot) -> Self {
        Self {
            id: snapshot.id.as_str().to_string(),
            name: snapshot.name.clone(),
            members: snapshot
                .members
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
        }
    }
}
