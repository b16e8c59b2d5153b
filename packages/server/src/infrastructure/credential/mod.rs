//! One-time token issuance and verification.

pub mod store;

pub use store::CredentialStore;
