//! Authentication module for managing the API key lifecycle.
//!
//! This module provides:
//! - `AuthService`: login, refresh before expiry, logout and login events
//! - `Session`: the current key and its expiry, mirrored to storage
//! - `KeyValueStore`: durable storage (memory, JSON file, OS keychain)
//! - `CredentialTransport`: the network calls `AuthService` depends on
//!
//! Keys are refreshed two minutes before they expire.

pub mod error;
pub mod events;
pub mod service;
pub mod session;
pub mod store;
pub mod transport;

pub use error::AuthError;
pub use events::{LiteEvent, Subscription};
pub use service::{AuthService, LoginByKeyOutcome, TimerStatus};
pub use session::Session;
pub use store::{FileStore, KeyValueStore, KeyringStore, MemoryStore};
pub use transport::CredentialTransport;
