//! User account endpoints.

use crate::models::{ApiResponseBase, PasswordParams};

use super::client::PASSWORD_HEADER;
use super::{ApiClient, ApiError};

/// Header carrying the new password
const NEW_PASSWORD_HEADER: &str = "NEW_PASSWORD";

impl ApiClient {
    /// `PUT /newPassword`, authenticated by this client's key.
    ///
    /// With `old_password` this is a regular password change; without it the
    /// client's key must be a temporary key from the password reset flow. When
    /// two-factor auth is enabled the first call fails with result code 17 and
    /// sends a passcode; call again with `params.passcode` set.
    pub async fn new_password(
        &self,
        new_password: &str,
        old_password: Option<&str>,
        params: &PasswordParams,
    ) -> Result<ApiResponseBase, ApiError> {
        let url = self.endpoint("/newPassword");
        let query = password_query(params);

        self.execute(&url, |http| {
            let request = http
                .put(&url)
                .query(&query)
                .header(NEW_PASSWORD_HEADER, new_password);
            match old_password {
                Some(old) => request.header(PASSWORD_HEADER, old),
                None => request,
            }
        })
        .await
    }
}

fn password_query(params: &PasswordParams) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(ref brand) = params.brand {
        query.push(("brand", brand.clone()));
    }
    if let Some(ref app_name) = params.app_name {
        query.push(("appName", app_name.clone()));
    }
    if let Some(ref passcode) = params.passcode {
        query.push(("passcode", passcode.clone()));
    }
    query
}
