//! InMemory implementations of the domain repositories.

pub mod message;

pub use message::InMemoryMessageRepository;
