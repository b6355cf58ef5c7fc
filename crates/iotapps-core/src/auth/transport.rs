use async_trait::async_trait;

use crate::api::ApiError;
use crate::models::{
    ApiResponseBase, AuthorizationParams, KeyType, LoginResponse, PasswordParams,
    SendPasscodeRequest, SendPasscodeResponse,
};

/// Network side of the session lifecycle.
///
/// `ApiClient` implements this over HTTP; `AuthService` only ever talks to
/// the trait so hosts and tests can substitute their own transport.
#[async_trait]
pub trait CredentialTransport: Send + Sync {
    /// Exchange a username and password for an API key.
    /// `key_type` of `None` lets the server pick its default key type.
    async fn login_by_password(
        &self,
        username: &str,
        password: &str,
        key_type: Option<KeyType>,
    ) -> Result<LoginResponse, ApiError>;

    /// Exchange a username and a one-time passcode for an API key
    async fn login_by_passcode(
        &self,
        username: &str,
        passcode: &str,
        key_type: KeyType,
    ) -> Result<LoginResponse, ApiError>;

    /// Exchange an existing key for a fresh one, or request a temporary key
    /// when `api_key` is `None`. The response may omit `key` if the supplied
    /// key is still valid.
    async fn login_by_key(
        &self,
        api_key: Option<&str>,
        key_type: Option<KeyType>,
    ) -> Result<LoginResponse, ApiError>;

    async fn send_passcode(
        &self,
        request: &SendPasscodeRequest,
    ) -> Result<SendPasscodeResponse, ApiError>;

    /// Invalidate `api_key` on the server for every client
    async fn logout(&self, api_key: &str) -> Result<ApiResponseBase, ApiError>;

    async fn set_new_password(
        &self,
        api_key: &str,
        new_password: &str,
        old_password: &str,
        params: &PasswordParams,
    ) -> Result<ApiResponseBase, ApiError>;

    async fn set_new_password_by_temp_key(
        &self,
        temp_key: &str,
        new_password: &str,
        params: &PasswordParams,
    ) -> Result<ApiResponseBase, ApiError>;

    /// URL that approves or denies a third-party OAuth authorization request
    async fn authorization_url(
        &self,
        approved: bool,
        params: &AuthorizationParams,
    ) -> Result<String, ApiError>;
}
