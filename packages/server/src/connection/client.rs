//! A connected, authenticated client.
//!
//! The client owns its outbound queue (many producers: every room that
//! broadcasts to it; one consumer: its writer loop) and the latch that
//! stands for its transport. Its joined-room set is only changed by the hub,
//! except that [`Client::close`] freezes it so no new room can be linked
//! after cleanup has started.

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::domain::{ClientId, Message, RoomId};

pub type OutboundReceiver = mpsc::Receiver<Arc<Message>>;

/// Lifecycle of one connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Authenticating,
    Joined,
    Active,
    Closing,
    Closed,
}

/// Why a non-blocking delivery did not enqueue the message
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    Full,
    #[error("outbound queue is closed")]
    Closed,
}

struct ClientState {
    rooms: HashSet<RoomId>,
    connection: ConnectionState,
}

pub struct Client {
    id: ClientId,
    username: String,
    outbound: Mutex<Option<mpsc::Sender<Arc<Message>>>>,
    state: Mutex<ClientState>,
    transport_closed: watch::Sender<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Client {
    /// Create a client and the receiving end of its outbound queue
    pub fn new(id: ClientId, username: String, queue_capacity: usize) -> (Arc<Self>, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let (transport_closed, _) = watch::channel(false);
        let client = Arc::new(Self {
            id,
            username,
            outbound: Mutex::new(Some(tx)),
            state: Mutex::new(ClientState {
                rooms: HashSet::new(),
                connection: ConnectionState::Authenticating,
            }),
            transport_closed,
        });
        (client, rx)
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Enqueue without waiting. Never blocks the caller.
    pub fn try_deliver(&self, message: Arc<Message>) -> Result<(), DeliveryError> {
        let outbound = lock(&self.outbound);
        let Some(sender) = outbound.as_ref() else {
            return Err(DeliveryError::Closed);
        };
        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    pub fn joined_rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = lock(&self.state).rooms.iter().cloned().collect();
        rooms.sort();
        rooms
    }

    pub fn is_in_room(&self, room_id: &RoomId) -> bool {
        lock(&self.state).rooms.contains(room_id)
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.state).connection
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Closing | ConnectionState::Closed
        )
    }

    /// Subscribe to the transport latch; flips to `true` once on close
    pub fn transport_closed(&self) -> watch::Receiver<bool> {
        self.transport_closed.subscribe()
    }

    /// Record the room on the client side of the membership link.
    ///
    /// Returns `false` when the room is already linked or the client is
    /// closing, in which case the caller must not link the room side either.
    pub(crate) fn link_room(&self, room_id: &RoomId) -> bool {
        let mut state = lock(&self.state);
        if matches!(
            state.connection,
            ConnectionState::Closing | ConnectionState::Closed
        ) {
            return false;
        }
        let inserted = state.rooms.insert(room_id.clone());
        if inserted && state.connection == ConnectionState::Authenticating {
            state.connection = ConnectionState::Joined;
        }
        inserted
    }

    pub(crate) fn unlink_room(&self, room_id: &RoomId) -> bool {
        lock(&self.state).rooms.remove(room_id)
    }

    /// Both pump loops are running
    pub(crate) fn mark_active(&self) {
        let mut state = lock(&self.state);
        if matches!(
            state.connection,
            ConnectionState::Authenticating | ConnectionState::Joined
        ) {
            state.connection = ConnectionState::Active;
        }
    }

    /// Both pump loops have exited
    pub(crate) fn mark_closed(&self) {
        lock(&self.state).connection = ConnectionState::Closed;
    }

    /// Start closing. Only the first call has any effect.
    ///
    /// Flips the transport latch, closes the outbound queue and returns the
    /// rooms the client was in at that moment. Later calls return `None`.
    pub(crate) fn close(&self) -> Option<Vec<RoomId>> {
        let rooms = {
            let mut state = lock(&self.state);
            if matches!(
                state.connection,
                ConnectionState::Closing | ConnectionState::Closed
            ) {
                return None;
            }
            state.connection = ConnectionState::Closing;
            state.rooms.iter().cloned().collect()
        };

        self.transport_closed.send_replace(true);
        // Dropping the only sender closes the queue for the writer loop.
        lock(&self.outbound).take();

        Some(rooms)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("state", &self.state())
            .finish()
    }
}
