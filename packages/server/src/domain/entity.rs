//! Core domain models for the chat application.

use serde::{Deserialize, Serialize};

use super::{
    factory::MessageIdFactory,
    value_object::{ClientId, MessageContent, MessageId, RoomId, Timestamp},
};

/// Content of the synthetic message emitted when a member leaves a room
pub const DEPARTURE_NOTICE: &str = "user has left the chat";

/// A chat message. Always belongs to exactly one room and one sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    /// Sender's client ID
    pub user_id: ClientId,
    pub content: MessageContent,
    pub timestamp: Timestamp,
}

impl Message {
    /// Create a message with a fresh id stamped at the current time
    pub fn new(room_id: RoomId, user_id: ClientId, content: MessageContent) -> Self {
        Self {
            id: MessageIdFactory::generate(),
            room_id,
            user_id,
            content,
            timestamp: Timestamp::now(),
        }
    }

    /// Notice broadcast to the remaining members when `user_id` leaves `room_id`
    pub fn departure_notice(room_id: RoomId, user_id: ClientId) -> Self {
        Self::new(
            room_id,
            user_id,
            MessageContent(DEPARTURE_NOTICE.to_string()),
        )
    }
}

/// Single-use credential exchanged for a WebSocket upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeToken {
    pub key: String,
    pub created_at: Timestamp,
}

impl OneTimeToken {
    pub fn new(key: String, created_at: Timestamp) -> Self {
        Self { key, created_at }
    }
}

/// Read-only view of a room and its current members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub name: String,
    /// Member ids, sorted
    pub members: Vec<ClientId>,
}
