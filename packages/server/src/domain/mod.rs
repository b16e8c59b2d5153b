//! Domain layer for the chat application.
//!
//! This module contains business logic that is independent of
//! data transfer objects (DTOs) and infrastructure concerns.

pub mod entity;
pub mod error;
pub mod factory;
pub mod repository;
pub mod value_object;

pub use entity::{DEPARTURE_NOTICE, Message, OneTimeToken, RoomSnapshot};
pub use error::{RepositoryError, ValueObjectError};
pub use factory::{MessageIdFactory, TokenKeyFactory};
pub use repository::MessageRepository;
#[cfg(test)]
pub use repository::MockMessageRepository;
pub use value_object::{ClientId, MessageContent, MessageId, RoomId, Timestamp};
