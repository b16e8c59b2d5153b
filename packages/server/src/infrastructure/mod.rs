//! Infrastructure layer: storage, credentials and wire formats.

pub mod credential;
pub mod dto;
pub mod repository;
