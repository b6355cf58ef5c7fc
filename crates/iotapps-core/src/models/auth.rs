use serde::{Deserialize, Deserializer, Serialize};

use super::ApiResponseBase;

/// Passcode delivery type understood by `GET /passcode`. Only SMS is used.
pub const PASSCODE_DELIVERY_SMS: i32 = 2;

/// Type of API key requested from the login endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    User,
    /// Short-lived key used for bootstrap flows such as password reset
    Temporary,
    Admin,
}

impl KeyType {
    /// Numeric code sent as the `keyType` query parameter
    pub fn code(self) -> i32 {
        match self {
            KeyType::User => 0,
            KeyType::Temporary => 1,
            KeyType::Admin => 11,
        }
    }

    /// Admin or user key, as selected by the `admin` flag of the login calls
    pub fn for_admin(admin: bool) -> Self {
        if admin {
            KeyType::Admin
        } else {
            KeyType::User
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub base: ApiResponseBase,
    /// Issued API key. `GET /loginByKey` may omit it when the supplied key
    /// is still valid long enough.
    pub key: Option<String>,
    /// Key expiration as an ISO-8601 / RFC 2822 date, or epoch milliseconds
    #[serde(rename = "keyExpire", default, deserialize_with = "string_or_number")]
    pub key_expire: Option<String>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<i64>,
}

pub type SendPasscodeResponse = ApiResponseBase;

#[derive(Debug, Clone, PartialEq)]
pub struct SendPasscodeRequest {
    pub username: String,
    pub delivery_type: i32,
    pub key_type: KeyType,
    pub brand: Option<String>,
}

/// Optional parameters of the new password endpoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasswordParams {
    /// Identifies the email template and other brand customization
    pub brand: Option<String>,
    pub app_name: Option<String>,
    /// Two-factor passcode, when the server asked for one (result code 17)
    pub passcode: Option<String>,
}

/// Parameters of the OAuth approve/deny URL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorizationParams {
    pub client_id: String,
    /// Only `code` is supported by the cloud
    pub response_type: String,
    /// Temporary API key
    pub api_key: String,
    pub state: Option<String>,
    pub location_id: Option<i64>,
    pub brand: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_codes() {
        assert_eq!(KeyType::User.code(), 0);
        assert_eq!(KeyType::Temporary.code(), 1);
        assert_eq!(KeyType::Admin.code(), 11);
        assert_eq!(KeyType::for_admin(true), KeyType::Admin);
        assert_eq!(KeyType::for_admin(false), KeyType::User);
    }

    #[test]
    fn test_parse_login_response() {
        let json = r#"{"resultCode": 0, "key": "abc-123", "keyExpire": "2026-10-19T12:00:00-04:00", "userId": 42}"#;
        let resp: LoginResponse = serde_json::from_str(json).expect("Failed to parse login JSON");
        assert!(resp.base.is_success());
        assert_eq!(resp.key.as_deref(), Some("abc-123"));
        assert_eq!(resp.key_expire.as_deref(), Some("2026-10-19T12:00:00-04:00"));
        assert_eq!(resp.user_id, Some(42));
    }

    #[test]
    fn test_parse_login_response_numeric_expire_without_key() {
        let json = r#"{"resultCode": 0, "keyExpire": 1792411200000}"#;
        let resp: LoginResponse = serde_json::from_str(json).expect("Failed to parse login JSON");
        assert_eq!(resp.key, None);
        assert_eq!(resp.key_expire.as_deref(), Some("1792411200000"));
    }
}
