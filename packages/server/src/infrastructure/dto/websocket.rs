//! WebSocket message DTOs for the chat application.

use serde::{Deserialize, Serialize};

use crate::domain::Message;

/// Chat message as written to clients.
///
/// `timestamp` is Unix milliseconds (JST).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub content: String,
    pub timestamp: i64,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.as_str().to_string(),
            room_id: message.room_id.as_str().to_string(),
            user_id: message.user_id.as_str().to_string(),
            content: message.content.as_str().to_string(),
            timestamp: message.timestamp.value(),
        }
    }
}

/// Chat message as read from clients.
///
/// Only the target room and the content are taken from the client; id,
/// sender and timestamp are assigned by the server. Any other fields of the
/// full message shape are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IncomingMessageDto {
    pub room_id: String,
    pub content: String,
}
