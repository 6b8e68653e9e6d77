//! HTTP client for the BookHub REST API.
//!
//! Every call goes through one pipeline:
//!
//! 1. Attach the active bearer token and a fresh `X-Request-Id`.
//! 2. Map non-success statuses onto [`ApiError`]; report 5xx to Sentry.
//! 3. On 401, recover the session (admin: end it; user: refresh the access
//!    token) and retry, at most `max_attempts` sends in total. A 401 on the
//!    last attempt still ends an admin session or one without a refresh
//!    token.
//!
//! When recovery is impossible storage is cleared, the navigator is sent to
//! the role's login route and the caller gets [`ApiError::SessionEnded`].

mod request;
mod retry;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use bookhub_core::Role;

pub use request::{ApiRequest, is_admin_path};
pub use retry::with_unauthorized_retry;

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{ApiError, clear_sentry_user, report_server_error};
use crate::navigation::Navigator;
use crate::session::{ADMIN_LOGIN_ROUTE, USER_LOGIN_ROUTE};

/// Outcome of inspecting the session after a 401.
enum Recovery {
    /// The session cannot be recovered; end it and send the user here.
    EndSession(&'static str),
    /// Exchange this refresh token and retry.
    Refresh(SecretString),
}

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Endpoint exchanging a refresh token for a new access token.
const REFRESH_PATH: &str = "/auth/refresh-token";

/// BookHub API client.
///
/// Cheap to clone; clones share the connection pool, storage and navigator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: CredentialStore,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("credentials", &self.inner.credentials)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(alias = "token")]
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Error body shapes used by the API.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(
        config: ClientConfig,
        credentials: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                config,
                credentials,
                navigator,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.inner.navigator
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// `GET path` and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await
    }

    /// `POST path` with a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?).await
    }

    /// `PUT path` with a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).json(body)?).await
    }

    /// Send `request` through the pipeline and decode the JSON response.
    ///
    /// An empty body decodes as JSON `null`.
    ///
    /// # Errors
    ///
    /// Returns the mapped `ApiError` for a failed status, `ApiError::Network`
    /// when no response arrived, `ApiError::Decode` for an unexpected body,
    /// and `ApiError::SessionEnded` when a 401 could not be recovered.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let text = self.send_raw(&request).await?;
        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(body).map_err(|e| {
            tracing::warn!(path = request.path(), error = %e, "unexpected response body");
            ApiError::Decode(e)
        })
    }

    /// Send `request` through the pipeline and return the raw body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_raw(&self, request: &ApiRequest) -> Result<String, ApiError> {
        if !request.recovers_unauthorized() {
            return self.execute(request).await;
        }

        let result = with_unauthorized_retry(
            self.inner.config.max_attempts,
            move || self.execute(request),
            move |_| self.recover_unauthorized(request),
        )
        .await;

        // Out of attempts: the refresh is skipped but teardown still applies.
        match result {
            Err(e) if e.is_unauthorized() => match self.recovery_for(request) {
                Recovery::EndSession(route) => Err(self.end_session(route)),
                Recovery::Refresh(_) => Err(e),
            },
            other => other,
        }
    }

    /// One attempt: attach headers, send, map the status.
    #[instrument(
        skip(self, request),
        fields(method = %request.method(), path = request.path(), request_id = tracing::field::Empty)
    )]
    async fn execute(&self, request: &ApiRequest) -> Result<String, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let url = self.inner.config.endpoint(request.path());
        let mut builder = self
            .inner
            .http
            .request(request.method().clone(), url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(REQUEST_ID_HEADER, &request_id);

        if let Some(token) = self.inner.credentials.active_token() {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(error = %e, "request failed without a response");
            ApiError::Network(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "request succeeded");
            return Ok(text);
        }

        let error = ApiError::from_status(status, error_message(&text, status));
        if status.is_server_error() {
            report_server_error(&error, request.method().as_str(), request.path());
        } else {
            tracing::debug!(status = status.as_u16(), error = %error, "request rejected");
        }
        Err(error)
    }

    // =========================================================================
    // Session recovery
    // =========================================================================

    /// Resolve a 401 so the request can be retried, or end the session.
    ///
    /// Admin sessions carry no refresh token, so a 401 on an admin endpoint
    /// (or while acting as an admin) ends the session immediately.
    async fn recover_unauthorized(&self, request: &ApiRequest) -> Result<(), ApiError> {
        let refresh_token = match self.recovery_for(request) {
            Recovery::EndSession(route) => return Err(self.end_session(route)),
            Recovery::Refresh(token) => token,
        };
        let credentials = &self.inner.credentials;

        let refreshed = match self.refresh_access_token(&refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                tracing::warn!(error = %e, "access token refresh failed");
                return Err(self.end_session(USER_LOGIN_ROUTE));
            }
        };

        let stored = credentials
            .store_access_token(&SecretString::from(refreshed.access_token))
            .and_then(|()| match refreshed.refresh_token {
                Some(rotated) => credentials.store_refresh_token(&SecretString::from(rotated)),
                None => Ok(()),
            });
        if let Err(e) = stored {
            tracing::error!(error = %e, "failed to store refreshed access token");
            return Err(self.end_session(USER_LOGIN_ROUTE));
        }

        tracing::info!("access token refreshed");
        Ok(())
    }

    /// How a 401 on `request` can be handled with the stored credentials.
    fn recovery_for(&self, request: &ApiRequest) -> Recovery {
        let credentials = &self.inner.credentials;
        let acting_as_admin = credentials.active_user().is_some_and(|u| u.role == Role::Admin);

        if request.is_admin_endpoint() || acting_as_admin {
            tracing::warn!(path = request.path(), "admin request unauthorized");
            return Recovery::EndSession(ADMIN_LOGIN_ROUTE);
        }

        match credentials.refresh_token() {
            Some(token) => Recovery::Refresh(token),
            None => {
                tracing::warn!(path = request.path(), "request unauthorized and no refresh token stored");
                Recovery::EndSession(USER_LOGIN_ROUTE)
            }
        }
    }

    /// Exchange the refresh token. Bypasses the pipeline: no bearer token
    /// and no 401 handling of its own.
    #[instrument(skip_all)]
    async fn refresh_access_token(
        &self,
        refresh_token: &SecretString,
    ) -> Result<RefreshResponse, ApiError> {
        let response = self
            .inner
            .http
            .post(self.inner.config.endpoint(REFRESH_PATH))
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .json(&RefreshRequest {
                refresh_token: refresh_token.expose_secret(),
            })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, error_message(&text, status)));
        }

        let refreshed: RefreshResponse = serde_json::from_str(&text).map_err(ApiError::Decode)?;
        if refreshed.access_token.trim().is_empty() {
            return Err(ApiError::Unauthorized("refresh returned an empty token".to_string()));
        }
        Ok(refreshed)
    }

    /// Clear stored credentials, send the navigator to `route` unless it is
    /// already there, and return the error describing it.
    pub fn end_session(&self, route: &'static str) -> ApiError {
        self.inner.credentials.clear();
        clear_sentry_user();

        if self.inner.navigator.current_path() != route {
            self.inner.navigator.navigate(route);
        }

        ApiError::SessionEnded { redirect: route }
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::StatusCode;

    use super::*;
    use crate::navigation::MemoryNavigator;
    use crate::session::test_support::user_session;
    use crate::storage::{MemoryStore, keys};

    fn client_at(path: &str) -> (ApiClient, Arc<MemoryStore>, Arc<MemoryNavigator>) {
        let backend = Arc::new(MemoryStore::new());
        let navigator = Arc::new(MemoryNavigator::new(path));
        let credentials = CredentialStore::new(backend.clone());
        credentials.save_session(&user_session("u1")).unwrap();
        let config = ClientConfig::new("http://127.0.0.1:9").unwrap();
        let client = ApiClient::new(config, credentials, navigator.clone()).unwrap();
        (client, backend, navigator)
    }

    #[test]
    fn test_error_message_prefers_body() {
        assert_eq!(
            error_message(r#"{"message":"Book not found"}"#, StatusCode::NOT_FOUND),
            "Book not found"
        );
        assert_eq!(
            error_message(r#"{"error":"Invalid token"}"#, StatusCode::UNAUTHORIZED),
            "Invalid token"
        );
        assert_eq!(error_message("<html>", StatusCode::BAD_GATEWAY), "Bad Gateway");
        assert_eq!(
            error_message(r#"{"message":""}"#, StatusCode::BAD_REQUEST),
            "Bad Request"
        );
    }

    #[test]
    fn test_end_session_clears_and_redirects() {
        let (client, backend, navigator) = client_at("/cart");

        let err = client.end_session(USER_LOGIN_ROUTE);

        assert!(matches!(err, ApiError::SessionEnded { redirect: "/login" }));
        assert!(!backend.contains(keys::TOKEN));
        assert!(!backend.contains(keys::USER));
        assert_eq!(navigator.redirects(), vec!["/login".to_string()]);
    }

    #[test]
    fn test_end_session_skips_redirect_when_already_there() {
        let (client, _, navigator) = client_at("/admin/login");

        client.end_session(ADMIN_LOGIN_ROUTE);

        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_keeps_session() {
        let (client, backend, navigator) = client_at("/");

        let result: Result<serde_json::Value, _> = client.get("/books").await;

        assert!(matches!(result, Err(ApiError::Network(_))));
        assert!(backend.contains(keys::TOKEN));
        assert!(navigator.redirects().is_empty());
    }
}
