use std::sync::Arc;

use anyhow::{Context, Result};

use crate::auth::{AuthError, AuthService, KeyValueStore};
use crate::config::Config;

use super::locations::LocationsApi;
use super::{ApiClient, ApiError};

/// Composition root: one `ApiClient` shared by the `AuthService` and every
/// endpoint wrapper.
///
/// Wrappers that need a key wait for `ensure_authenticated()` and report a
/// rejected key back to the `AuthService`, which logs out and fires
/// `on_need_relogin`.
#[derive(Clone)]
pub struct AppApi {
    client: ApiClient,
    auth: AuthService,
}

impl AppApi {
    /// Must be called from within a Tokio runtime: a persisted key arms its
    /// expiry timer immediately.
    pub fn new(client: ApiClient, store: Arc<dyn KeyValueStore>) -> Self {
        let auth = AuthService::new(Arc::new(client.clone()), store);
        Self { client, auth }
    }

    /// Build the client and storage described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ApiClient::new(&config.server_url).context("Failed to create API client")?;
        let store = config.open_store()?;
        Ok(Self::new(client, store))
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn locations(&self) -> LocationsApi<'_> {
        LocationsApi { app: self }
    }

    /// Wait for a session, then return a client carrying its key
    pub(crate) async fn authorized_client(&self) -> Result<ApiClient, AuthError> {
        self.auth.ensure_authenticated().await;
        let key = self.auth.api_key().ok_or(AuthError::NotAuthenticated)?;
        Ok(self.client.with_api_key(key))
    }

    pub(crate) fn on_api_error(&self, err: ApiError) -> AuthError {
        if err.is_unauthorized() {
            self.auth.handle_unauthorized();
        }
        AuthError::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;

    #[tokio::test]
    async fn test_rejected_key_logs_out() {
        let store = Arc::new(MemoryStore::new());
        store.set("Auth-Key", "stale-key").expect("Failed to seed store");
        let client = ApiClient::new("https://example.test").expect("Failed to build client");
        let app = AppApi::new(client, store);
        assert!(app.auth().is_authenticated());

        let relogin = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = relogin.clone();
        app.auth()
            .on_need_relogin()
            .on(move || flag.store(true, std::sync::atomic::Ordering::SeqCst));

        let err = app.on_api_error(ApiError::Unauthorized);
        assert!(matches!(err, AuthError::Transport(ApiError::Unauthorized)));
        assert!(!app.auth().is_authenticated());
        assert!(relogin.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_other_errors_keep_session() {
        let store = Arc::new(MemoryStore::new());
        store.set("Auth-Key", "good-key").expect("Failed to seed store");
        let client = ApiClient::new("https://example.test").expect("Failed to build client");
        let app = AppApi::new(client, store);

        let _ = app.on_api_error(ApiError::RateLimited);
        assert!(app.auth().is_authenticated());

        let authorized = app.authorized_client().await.expect("Expected a session");
        assert_eq!(authorized.api_key(), Some("good-key"));
    }
}
