//! Client SDK for the IoT Apps cloud REST API.
//!
//! The crate is split into:
//! - `api`: the reqwest-based `ApiClient`, endpoint wrappers and the `AppApi`
//!   composition root
//! - `auth`: `AuthService`, which owns the API key lifecycle (login, persist,
//!   refresh before expiry, logout) and publishes login/logout events
//! - `models`: typed request and response payloads
//! - `config`: on-disk configuration and storage selection

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, AppApi};
pub use auth::{AuthError, AuthService, KeyValueStore, LiteEvent, Session};
pub use config::Config;
