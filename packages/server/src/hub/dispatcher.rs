//! Hub dispatch loop.

use std::{collections::HashMap, sync::Arc};

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    common::ShutdownSignal,
    config::HubSettings,
    connection::Client,
    domain::{Message, MessageRepository, RoomId, RoomSnapshot},
};

use super::{HubError, HubEvent, HubHandle, Room};

pub struct Hub {
    rooms: HashMap<RoomId, Arc<Room>>,
    repository: Arc<dyn MessageRepository>,
    settings: HubSettings,
    events: mpsc::Receiver<HubEvent>,
}

impl Hub {
    pub fn new(repository: Arc<dyn MessageRepository>, settings: HubSettings) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(settings.event_queue_capacity.max(1));
        let hub = Self {
            rooms: HashMap::new(),
            repository,
            settings,
            events: rx,
        };
        (hub, HubHandle::new(tx))
    }

    /// Build a hub and run it on its own task
    pub fn spawn(
        repository: Arc<dyn MessageRepository>,
        settings: HubSettings,
        shutdown: ShutdownSignal,
    ) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(repository, settings);
        let task = tokio::spawn(hub.run(shutdown));
        (handle, task)
    }

    /// Process events until shutdown or until every handle is dropped
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        tracing::info!("Hub started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
            }
        }
        tracing::info!(rooms = self.rooms.len(), "Hub stopped");
    }

    async fn handle_event(&mut self, event: HubEvent) {
        tracing::trace!(kind = event.kind(), "Hub event");
        match event {
            HubEvent::Register {
                client,
                room_id,
                reply,
            } => {
                let result = self.register(&client, &room_id).await;
                let _ = reply.send(result);
            }
            HubEvent::Unregister { client, room_id } => {
                self.unregister(&client, &room_id).await;
            }
            HubEvent::Broadcast { message } => {
                self.broadcast(message).await;
            }
            HubEvent::CreateRoom {
                room_id,
                name,
                reply,
            } => {
                let _ = reply.send(self.create_room(room_id, name));
            }
            HubEvent::ListRooms { reply } => {
                let mut rooms: Vec<RoomSnapshot> =
                    self.rooms.values().map(|room| room.snapshot()).collect();
                rooms.sort_by(|a, b| a.id.cmp(&b.id));
                let _ = reply.send(rooms);
            }
            HubEvent::GetRoom { room_id, reply } => {
                let _ = reply.send(self.rooms.get(&room_id).map(|room| room.snapshot()));
            }
        }
    }

    fn create_room(&mut self, room_id: RoomId, name: String) -> RoomSnapshot {
        let room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::info!(room_id = %room_id, name = %name, "Room created");
            Arc::new(Room::new(room_id, name))
        });
        room.snapshot()
    }

    async fn register(&mut self, client: &Arc<Client>, room_id: &RoomId) -> Result<(), HubError> {
        let Some(room) = self.rooms.get(room_id).cloned() else {
            tracing::warn!(room_id = %room_id, client_id = %client.id(), "Register for unknown room");
            return Err(HubError::RoomNotFound(room_id.clone()));
        };

        if room.contains(client.id()) {
            return if client.is_in_room(room_id) {
                Ok(())
            } else {
                Err(HubError::DuplicateMember(client.id().clone()))
            };
        }

        if !client.link_room(room_id) {
            return if client.is_closed() {
                Err(HubError::ClientClosed)
            } else {
                Ok(())
            };
        }
        room.add_member(client);
        tracing::info!(
            room_id = %room_id,
            client_id = %client.id(),
            members = room.member_count(),
            "Client joined room"
        );

        self.prime_history(client, room_id).await;
        Ok(())
    }

    /// Replay recent history to a client that just joined, oldest first
    async fn prime_history(&self, client: &Arc<Client>, room_id: &RoomId) {
        if self.settings.history_limit == 0 {
            return;
        }
        let history = match self
            .repository
            .find_recent(room_id, self.settings.history_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(room_id = %room_id, "Failed to load history: {}", e);
                return;
            }
        };

        for message in history.into_iter().rev() {
            if let Err(e) = client.try_deliver(Arc::new(message)) {
                tracing::warn!(client_id = %client.id(), "History replay cut short: {}", e);
                break;
            }
        }
    }

    async fn unregister(&mut self, client: &Arc<Client>, room_id: &RoomId) {
        let Some(room) = self.rooms.get(room_id).cloned() else {
            tracing::warn!(room_id = %room_id, client_id = %client.id(), "Unregister for unknown room");
            return;
        };

        let members_before = room.member_count();
        let removed = room.remove_member(client);
        client.unlink_room(room_id);
        if !removed {
            tracing::debug!(room_id = %room_id, client_id = %client.id(), "Unregister for non-member");
            return;
        }
        tracing::info!(room_id = %room_id, client_id = %client.id(), "Client left room");

        if members_before >= 2 {
            self.broadcast(Message::departure_notice(
                room_id.clone(),
                client.id().clone(),
            ))
            .await;
        }
    }

    /// Persist first; on failure the message is dropped for everyone.
    async fn broadcast(&self, message: Message) {
        if let Err(e) = self.repository.insert(&message).await {
            tracing::error!(
                message_id = %message.id,
                room_id = %message.room_id,
                "Dropping message, persistence failed: {}",
                e
            );
            return;
        }

        let Some(room) = self.rooms.get(&message.room_id) else {
            tracing::warn!(room_id = %message.room_id, "Broadcast to unknown room discarded");
            return;
        };

        let skip = if self.settings.echo_to_sender {
            None
        } else {
            Some(message.user_id.clone())
        };
        let message = Arc::new(message);
        let report = room.broadcast(&message, skip.as_ref());
        tracing::debug!(
            room_id = %message.room_id,
            attempted = report.attempted,
            delivered = report.delivered,
            dropped = report.dropped,
            "Fan-out complete"
        );
    }
}
