use thiserror::Error;

use crate::error::ApiError;

/// Failed auth operation, carrying the message to show the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthFailure {
    pub message: String,
}

impl AuthFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Failure of a sign-in request, where 401 means bad credentials.
    pub(crate) fn sign_in(error: &ApiError) -> Self {
        match error {
            ApiError::Unauthorized(_) => Self::new("Invalid email or password"),
            other => Self::from(other),
        }
    }
}

impl From<&ApiError> for AuthFailure {
    fn from(error: &ApiError) -> Self {
        Self::new(error.user_message())
    }
}
