//! API error taxonomy with Sentry integration.
//!
//! Every call made through [`ApiClient`](crate::ApiClient) fails with an
//! [`ApiError`]. Authentication failures are resolved centrally by the
//! client's 401 handling; everything else is returned to the caller, which
//! shows [`ApiError::user_message`] inline or as a toast.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by BookHub API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request rejected as invalid (4xx other than 401/403). User-fixable.
    #[error("Validation error ({status}): {message}")]
    Validation { status: StatusCode, message: String },

    /// The server did not accept the credentials (401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The credentials are valid but lack permission (403).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The server failed (5xx).
    #[error("Server error ({status}): {message}")]
    Server { status: StatusCode, message: String },

    /// No response was received.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("Response decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// The request body could not be encoded.
    #[error("Request encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// A 401 could not be recovered; storage was cleared and the client was
    /// sent to `redirect`.
    #[error("Session ended, redirected to {redirect}")]
    SessionEnded { redirect: &'static str },
}

impl ApiError {
    /// Build the error matching a non-success status.
    #[must_use]
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            s if s.is_server_error() => Self::Server { status, message },
            _ => Self::Validation { status, message },
        }
    }

    /// Whether this is a 401 that the session layer may try to recover.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Whether the session was torn down while handling this error.
    #[must_use]
    pub const fn ended_session(&self) -> bool {
        matches!(self, Self::SessionEnded { .. })
    }

    /// HTTP status behind the error, when there was a response.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Validation { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            Self::Forbidden(_) => Some(StatusCode::FORBIDDEN),
            _ => None,
        }
    }

    /// Text to show the user.
    ///
    /// Validation messages come from the server and are shown verbatim; the
    /// other classes get a fixed message that never leaks internals.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::Unauthorized(_) | Self::SessionEnded { .. } => {
                "Your session has ended. Please sign in again.".to_string()
            }
            Self::Forbidden(_) => "You do not have permission to do that.".to_string(),
            Self::Network(_) => {
                "Unable to reach BookHub. Check your connection and try again.".to_string()
            }
            Self::Server { .. } | Self::Decode(_) | Self::Encode(_) => {
                "Something went wrong on our end. Please try again later.".to_string()
            }
        }
    }
}

/// Log a server-side failure and capture it to Sentry.
pub(crate) fn report_server_error(error: &ApiError, method: &str, path: &str) {
    let event_id = sentry::capture_error(error);
    tracing::error!(
        error = %error,
        method,
        path,
        sentry_event_id = %event_id,
        "BookHub API server error"
    );
}

/// Set the Sentry user context after a successful sign-in.
pub(crate) fn set_sentry_user(user: &bookhub_core::User) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user.id.to_string()),
            email: Some(user.email.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on sign-out.
pub(crate) fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
