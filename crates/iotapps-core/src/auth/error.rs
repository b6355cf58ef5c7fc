use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Rejected locally, no request was sent
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Transport(#[from] ApiError),

    /// The key expires before it could be refreshed. Handled internally by a
    /// local logout and `on_need_relogin`; never returned to callers.
    #[error("API key expired: {0}")]
    Expired(String),
}

impl AuthError {
    /// The underlying transport error, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            AuthError::Transport(err) => Some(err),
            _ => None,
        }
    }
}
