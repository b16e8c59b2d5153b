//! Shared utilities for Hubchat.

pub mod logger;
