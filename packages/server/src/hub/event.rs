//! Events consumed by the hub loop.
//!
//! Every event travels through one channel, so the hub observes a single
//! total order over membership changes, broadcasts and room queries.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::{
    connection::Client,
    domain::{Message, RoomId, RoomSnapshot},
};

use super::HubError;

pub enum HubEvent {
    /// Link client and room, only if the room exists
    Register {
        client: Arc<Client>,
        room_id: RoomId,
        reply: oneshot::Sender<Result<(), HubError>>,
    },
    /// Remove the link if present
    Unregister { client: Arc<Client>, room_id: RoomId },
    /// Persist, then fan out to the owning room
    Broadcast { message: Message },
    /// Create the room unless it already exists
    CreateRoom {
        room_id: RoomId,
        name: String,
        reply: oneshot::Sender<RoomSnapshot>,
    },
    ListRooms {
        reply: oneshot::Sender<Vec<RoomSnapshot>>,
    },
    GetRoom {
        room_id: RoomId,
        reply: oneshot::Sender<Option<RoomSnapshot>>,
    },
}

impl HubEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Unregister { .. } => "unregister",
            Self::Broadcast { .. } => "broadcast",
            Self::CreateRoom { .. } => "create_room",
            Self::ListRooms { .. } => "list_rooms",
            Self::GetRoom { .. } => "get_room",
        }
    }
}
