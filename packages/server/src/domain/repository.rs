//! Storage collaborator contract.
//!
//! The hub depends on this trait only; concrete stores live in the
//! infrastructure layer.

use async_trait::async_trait;

use super::{Message, RepositoryError, RoomId};

/// Durable message store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist one message
    async fn insert(&self, message: &Message) -> Result<(), RepositoryError>;

    /// Up to `limit` messages of a room, most recent first
    async fn find_recent(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError>;
}
