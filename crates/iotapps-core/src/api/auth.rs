//! Login, logout, passcode and OAuth host endpoints.

use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use crate::auth::CredentialTransport;
use crate::models::{
    ApiResponseBase, AuthorizationParams, KeyType, LoginResponse, PasswordParams,
    SendPasscodeRequest, SendPasscodeResponse,
};

use super::client::PASSWORD_HEADER;
use super::{ApiClient, ApiError};

impl ApiClient {
    /// `GET /login` with the password in a header
    pub async fn login(
        &self,
        username: &str,
        password: Option<&str>,
        passcode: Option<&str>,
        key_type: Option<KeyType>,
    ) -> Result<LoginResponse, ApiError> {
        let url = self.endpoint("/login");
        let mut query = vec![("username", username.to_string())];
        if let Some(passcode) = passcode {
            query.push(("passcode", passcode.to_string()));
        }
        if let Some(key_type) = key_type {
            query.push(("keyType", key_type.code().to_string()));
        }

        debug!(username = username, "Logging in");
        self.execute(&url, |http| {
            let request = http.get(&url).query(&query);
            match password {
                Some(password) => request.header(PASSWORD_HEADER, password),
                None => request,
            }
        })
        .await
    }

    /// `GET /loginByKey`, authenticated by `api_key` when given
    pub async fn login_with_key(
        &self,
        api_key: Option<&str>,
        key_type: Option<KeyType>,
    ) -> Result<LoginResponse, ApiError> {
        let client = match api_key {
            Some(key) => self.with_api_key(key),
            None => self.clone(),
        };
        let url = client.endpoint("/loginByKey");
        let query: Vec<(&str, String)> = key_type
            .map(|k| vec![("keyType", k.code().to_string())])
            .unwrap_or_default();

        client
            .execute(&url, |http| http.get(&url).query(&query))
            .await
    }

    /// `GET /passcode` - sends a one-time code to the user
    pub async fn request_passcode(
        &self,
        request: &SendPasscodeRequest,
    ) -> Result<SendPasscodeResponse, ApiError> {
        let url = self.endpoint("/passcode");
        let mut query = vec![
            ("username", request.username.clone()),
            ("type", request.delivery_type.to_string()),
            ("keyType", request.key_type.code().to_string()),
        ];
        if let Some(ref brand) = request.brand {
            query.push(("brand", brand.clone()));
        }

        self.execute(&url, |http| http.get(&url).query(&query)).await
    }

    /// `GET /logout` - annuls the key for every client
    pub async fn logout_key(&self, api_key: &str) -> Result<ApiResponseBase, ApiError> {
        let client = self.with_api_key(api_key);
        let url = client.endpoint("/logout");
        client.execute(&url, |http| http.get(&url)).await
    }

    /// Build the URL that approves or denies an OAuth authorization request.
    /// The user agent is redirected there, so the temporary key travels in the query.
    pub fn oauth_authorization_url(
        &self,
        approved: bool,
        params: &AuthorizationParams,
    ) -> Result<String, ApiError> {
        let mut url = Url::parse(&self.endpoint("/oauth/authorize"))
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &params.client_id)
                .append_pair("response_type", &params.response_type)
                .append_pair("approved", if approved { "true" } else { "false" })
                .append_pair("API_KEY", &params.api_key);
            if let Some(ref state) = params.state {
                query.append_pair("state", state);
            }
            if let Some(location_id) = params.location_id {
                query.append_pair("locationId", &location_id.to_string());
            }
            if let Some(ref brand) = params.brand {
                query.append_pair("brand", brand);
            }
        }
        Ok(url.into())
    }
}

#[async_trait]
impl CredentialTransport for ApiClient {
    async fn login_by_password(
        &self,
        username: &str,
        password: &str,
        key_type: Option<KeyType>,
    ) -> Result<LoginResponse, ApiError> {
        self.login(username, Some(password), None, key_type).await
    }

    async fn login_by_passcode(
        &self,
        username: &str,
        passcode: &str,
        key_type: KeyType,
    ) -> Result<LoginResponse, ApiError> {
        self.login(username, None, Some(passcode), Some(key_type)).await
    }

    async fn login_by_key(
        &self,
        api_key: Option<&str>,
        key_type: Option<KeyType>,
    ) -> Result<LoginResponse, ApiError> {
        self.login_with_key(api_key, key_type).await
    }

    async fn send_passcode(
        &self,
        request: &SendPasscodeRequest,
    ) -> Result<SendPasscodeResponse, ApiError> {
        self.request_passcode(request).await
    }

    async fn logout(&self, api_key: &str) -> Result<ApiResponseBase, ApiError> {
        self.logout_key(api_key).await
    }

    async fn set_new_password(
        &self,
        api_key: &str,
        new_password: &str,
        old_password: &str,
        params: &PasswordParams,
    ) -> Result<ApiResponseBase, ApiError> {
        self.with_api_key(api_key)
            .new_password(new_password, Some(old_password), params)
            .await
    }

    async fn set_new_password_by_temp_key(
        &self,
        temp_key: &str,
        new_password: &str,
        params: &PasswordParams,
    ) -> Result<ApiResponseBase, ApiError> {
        self.with_api_key(temp_key)
            .new_password(new_password, None, params)
            .await
    }

    async fn authorization_url(
        &self,
        approved: bool,
        params: &AuthorizationParams,
    ) -> Result<String, ApiError> {
        self.oauth_authorization_url(approved, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_authorization_url() {
        let client = ApiClient::new("https://example.test").expect("Failed to build client");
        let params = AuthorizationParams {
            client_id: "client 1".to_string(),
            response_type: "code".to_string(),
            api_key: "temp-key".to_string(),
            state: Some("xyz".to_string()),
            location_id: Some(77),
            brand: None,
        };

        let url = client
            .oauth_authorization_url(false, &params)
            .expect("Failed to build URL");
        assert_eq!(
            url,
            "https://example.test/cloud/json/oauth/authorize?client_id=client+1&response_type=code&approved=false&API_KEY=temp-key&state=xyz&locationId=77"
        );
    }
}
