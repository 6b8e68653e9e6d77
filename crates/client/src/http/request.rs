use reqwest::Method;
use serde::Serialize;

use crate::error::ApiError;

/// A BookHub API call that can be sent more than once.
///
/// The body is encoded up front so a retry resends exactly the same bytes.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    recover_unauthorized: bool,
}

impl ApiRequest {
    /// A request with no body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            recover_unauthorized: true,
        }
    }

    /// `GET path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT path`.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Encode` if `body` cannot be serialized.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body).map_err(ApiError::Encode)?);
        Ok(self)
    }

    /// Return a 401 to the caller as-is instead of refreshing or ending the
    /// session. Used for the sign-in endpoints, where a 401 means "wrong
    /// password", not "expired session".
    #[must_use]
    pub const fn without_session_recovery(mut self) -> Self {
        self.recover_unauthorized = false;
        self
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    #[must_use]
    pub const fn recovers_unauthorized(&self) -> bool {
        self.recover_unauthorized
    }

    /// Whether the request targets the admin API.
    #[must_use]
    pub fn is_admin_endpoint(&self) -> bool {
        is_admin_path(&self.path)
    }
}

/// `/admin` or anything below it, ignoring a query string.
#[must_use]
pub fn is_admin_path(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path == "/admin" || path.starts_with("/admin/")
}
