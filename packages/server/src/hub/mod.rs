//! The hub: single serialized coordinator owning the room table.
//!
//! Membership changes, broadcasts and room queries are handled one at a
//! time by one task, which is what keeps `client ∈ room.members ⇔
//! room ∈ client.rooms` true without any table-wide lock.

mod dispatcher;
mod event;
mod handle;
pub mod room;

use thiserror::Error;

use crate::domain::{ClientId, RoomId};

pub use dispatcher::Hub;
pub use event::HubEvent;
pub use handle::HubHandle;
pub use room::{FanOut, Room};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubError {
    /// The hub loop has stopped
    #[error("hub is not running")]
    Closed,

    #[error("room '{0}' not found")]
    RoomNotFound(RoomId),

    /// A different connection with the same client id is already a member
    #[error("client '{0}' is already connected to this room")]
    DuplicateMember(ClientId),

    /// The client started closing before the event was processed
    #[error("client connection is closing")]
    ClientClosed,
}
