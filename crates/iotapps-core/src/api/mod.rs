//! REST API client module for the IoT Apps cloud.
//!
//! This module provides the `ApiClient` for communicating with the
//! `/cloud/json` API and the `AppApi` composition root that pairs it with
//! an `AuthService`.
//!
//! Requests are authenticated with the `API_KEY` header obtained from one
//! of the login endpoints.

mod app;
mod auth;
pub mod client;
pub mod error;
pub mod locations;
mod user_accounts;

pub use app::AppApi;
pub use client::{ApiClient, DEFAULT_SERVER_URL};
pub use error::ApiError;
pub use locations::LocationsApi;
