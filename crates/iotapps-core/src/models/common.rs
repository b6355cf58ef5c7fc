use serde::{Deserialize, Serialize};

/// Result envelope shared by every cloud response.
///
/// The cloud answers most application errors with HTTP 200 and a non-zero
/// `resultCode`, so callers must check it in addition to the HTTP status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponseBase {
    #[serde(rename = "resultCode", default)]
    pub result_code: i32,
    #[serde(rename = "resultCodeMessage", skip_serializing_if = "Option::is_none")]
    pub result_code_message: Option<String>,
    #[serde(rename = "resultCodeDesc", skip_serializing_if = "Option::is_none")]
    pub result_code_desc: Option<String>,
}

impl ApiResponseBase {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    /// Best human readable description of the result
    pub fn message(&self) -> String {
        self.result_code_message
            .clone()
            .or_else(|| self.result_code_desc.clone())
            .unwrap_or_else(|| format!("result code {}", self.result_code))
    }
}
