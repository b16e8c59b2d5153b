//! Cloneable entry point to the hub loop.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::{
    connection::Client,
    domain::{Message, RoomId, RoomSnapshot},
};

use super::{HubError, HubEvent};

#[derive(Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    pub(crate) fn new(events: mpsc::Sender<HubEvent>) -> Self {
        Self { events }
    }

    /// Waits for queue space, so a busy hub slows its producers down
    async fn send(&self, event: HubEvent) -> Result<(), HubError> {
        self.events.send(event).await.map_err(|_| HubError::Closed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> HubEvent,
    ) -> Result<T, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply)).await?;
        response.await.map_err(|_| HubError::Closed)
    }

    /// Join `client` to an existing room and wait until the hub has done it
    pub async fn register(&self, client: Arc<Client>, room_id: RoomId) -> Result<(), HubError> {
        self.request(|reply| HubEvent::Register {
            client,
            room_id,
            reply,
        })
        .await?
    }

    /// Queue a leave. Returns once queued, not once processed.
    pub async fn unregister(&self, client: Arc<Client>, room_id: RoomId) -> Result<(), HubError> {
        self.send(HubEvent::Unregister { client, room_id }).await
    }

    /// Queue a message for persistence and fan-out. Returns once queued, not
    /// once delivered.
    pub async fn broadcast(&self, message: Message) -> Result<(), HubError> {
        self.send(HubEvent::Broadcast { message }).await
    }

    /// Create a room; an existing room with the same id is returned unchanged
    pub async fn create_room(&self, room_id: RoomId, name: String) -> Result<RoomSnapshot, HubError> {
        self.request(|reply| HubEvent::CreateRoom {
            room_id,
            name,
            reply,
        })
        .await
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomSnapshot>, HubError> {
        self.request(|reply| HubEvent::ListRooms { reply }).await
    }

    pub async fn room_snapshot(&self, room_id: RoomId) -> Result<Option<RoomSnapshot>, HubError> {
        self.request(|reply| HubEvent::GetRoom { room_id, reply })
            .await
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}
