//! Integration tests for the HTTP client's request and 401 handling.

#![allow(clippy::unwrap_used)]

use bookhub_client::storage::keys;
use bookhub_client::{ApiError, ClientConfig, KeyValueStore, RentalService};
use bookhub_integration_tests::MockBookHub;
use secrecy::ExposeSecret;

// =============================================================================
// Request phase
// =============================================================================

#[tokio::test]
async fn test_attaches_bearer_and_request_id() {
    let server = MockBookHub::start().await;
    let client = server.client();
    let token = server.seed_member_session(&client);

    RentalService::new(client.api.clone()).history().await.unwrap();

    let requests = server.requests_to("/rentals/history");
    assert_eq!(requests.len(), 1);
    let request = requests.first().unwrap();
    assert_eq!(request.authorization.as_deref(), Some(format!("Bearer {token}").as_str()));
    assert!(request.request_id.as_deref().is_some_and(|id| id.len() == 36));
}

#[tokio::test]
async fn test_guest_requests_are_unauthenticated() {
    let server = MockBookHub::start().await;
    let client = server.client();

    let _: serde_json::Value = client.api.get("/books/recommendations").await.unwrap();

    let request = server.requests_to("/books/recommendations").pop().unwrap();
    assert!(request.authorization.is_none());
}

#[tokio::test]
async fn test_request_ids_are_unique() {
    let server = MockBookHub::start().await;
    let client = server.client();

    for _ in 0..3 {
        let _: serde_json::Value = client.api.get("/books/recommendations").await.unwrap();
    }

    let mut ids: Vec<_> = server
        .requests()
        .into_iter()
        .filter_map(|r| r.request_id)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

// =============================================================================
// Refresh and retry
// =============================================================================

#[tokio::test]
async fn test_refreshes_and_retries_once() {
    let server = MockBookHub::start().await;
    let client = server.client();
    let stale = server.seed_member_session(&client);
    server.expire_token(&stale);

    let rentals = RentalService::new(client.api.clone()).history().await.unwrap();
    assert_eq!(rentals.len(), 2);

    assert_eq!(server.requests_to("/auth/refresh-token").len(), 1);
    let attempts = server.requests_to("/rentals/history");
    assert_eq!(attempts.len(), 2);

    let fresh = client.credentials().active_token().unwrap();
    assert_ne!(fresh.expose_secret(), stale);
    assert_eq!(
        attempts.last().unwrap().authorization.as_deref(),
        Some(format!("Bearer {}", fresh.expose_secret()).as_str())
    );
    assert!(client.navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_refresh_request_carries_no_bearer() {
    let server = MockBookHub::start().await;
    let client = server.client();
    let stale = server.seed_member_session(&client);
    server.expire_token(&stale);

    RentalService::new(client.api.clone()).history().await.unwrap();

    let refresh = server.requests_to("/auth/refresh-token").pop().unwrap();
    assert!(refresh.authorization.is_none());
}

#[tokio::test]
async fn test_second_unauthorized_is_not_retried() {
    let server = MockBookHub::start().await;
    let client = server.client();
    server.seed_member_session(&client);
    server.reject_all_tokens();

    let result = RentalService::new(client.api.clone()).history().await;

    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    assert_eq!(server.requests_to("/rentals/history").len(), 2);
    assert_eq!(server.requests_to("/auth/refresh-token").len(), 1);
}

#[tokio::test]
async fn test_single_attempt_config_never_refreshes() {
    let server = MockBookHub::start().await;
    let mut config = server.config();
    config.max_attempts = 1;
    let client = server.client_with(config, "/");
    let stale = server.seed_member_session(&client);
    server.expire_token(&stale);

    let result = RentalService::new(client.api.clone()).history().await;

    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    assert!(server.requests_to("/auth/refresh-token").is_empty());
}

// =============================================================================
// Session teardown
// =============================================================================

#[tokio::test]
async fn test_single_attempt_admin_unauthorized_ends_session() {
    let server = MockBookHub::start().await;
    let mut config = server.config();
    config.max_attempts = 1;
    let client = server.client_with(config, "/admin/books");
    server.seed_admin_session(&client);
    server.reject_all_tokens();

    let result: Result<serde_json::Value, _> = client.api.get("/admin/books").await;

    assert!(matches!(result, Err(ApiError::SessionEnded { redirect: "/admin/login" })));
    assert_eq!(server.requests_to("/admin/books").len(), 1);
    assert!(client.store.get(keys::ADMIN_TOKEN).is_none());
    assert!(client.store.get(keys::ADMIN_USER).is_none());
    assert_eq!(client.navigator.redirects(), vec!["/admin/login".to_string()]);
}

#[tokio::test]
async fn test_single_attempt_without_refresh_token_ends_session() {
    let server = MockBookHub::start().await;
    let mut config = server.config();
    config.max_attempts = 1;
    let client = server.client_with(config, "/rentals");
    let stale = server.seed_member_session(&client);
    client.store.remove(keys::REFRESH_TOKEN).unwrap();
    server.expire_token(&stale);

    let result = RentalService::new(client.api.clone()).history().await;

    assert!(matches!(result, Err(ApiError::SessionEnded { redirect: "/login" })));
    assert!(client.store.get(keys::TOKEN).is_none());
    assert_eq!(client.navigator.redirects(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn test_refresh_failure_ends_session() {
    let server = MockBookHub::start().await;
    let client = server.client_with(server.config(), "/rentals");
    let stale = server.seed_member_session(&client);
    server.expire_token(&stale);
    server.fail_refresh();

    let result = RentalService::new(client.api.clone()).history().await;

    assert!(matches!(result, Err(ApiError::SessionEnded { redirect: "/login" })));
    assert_eq!(server.requests_to("/rentals/history").len(), 1);
    for key in keys::SESSION_KEYS {
        assert!(client.store.get(key).is_none(), "{key} should be cleared");
    }
    assert_eq!(client.navigator.redirects(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn test_missing_refresh_token_ends_session() {
    let server = MockBookHub::start().await;
    let client = server.client();
    let stale = server.seed_member_session(&client);
    client.store.remove(keys::REFRESH_TOKEN).unwrap();
    server.expire_token(&stale);

    let result = RentalService::new(client.api.clone()).history().await;

    assert!(matches!(result, Err(ApiError::SessionEnded { redirect: "/login" })));
    assert!(server.requests_to("/auth/refresh-token").is_empty());
    assert_eq!(client.navigator.redirects(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn test_no_redirect_when_already_on_login() {
    let server = MockBookHub::start().await;
    let client = server.client_with(server.config(), "/login");
    let stale = server.seed_member_session(&client);
    server.expire_token(&stale);
    server.fail_refresh();

    let result = RentalService::new(client.api.clone()).history().await;

    assert!(result.is_err_and(|e| e.ended_session()));
    assert!(client.navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_admin_endpoint_unauthorized_goes_to_admin_login() {
    let server = MockBookHub::start().await;
    let client = server.client_with(server.config(), "/admin/books");
    let token = server.seed_admin_session(&client);
    server.expire_token(&token);

    let result: Result<serde_json::Value, _> = client.api.get("/admin/books").await;

    assert!(matches!(result, Err(ApiError::SessionEnded { redirect: "/admin/login" })));
    assert!(server.requests_to("/auth/refresh-token").is_empty());
    assert!(client.store.get(keys::ADMIN_TOKEN).is_none());
    assert!(client.store.get(keys::ADMIN_USER).is_none());
    assert_eq!(client.navigator.redirects(), vec!["/admin/login".to_string()]);
}

#[tokio::test]
async fn test_admin_session_on_member_endpoint_goes_to_admin_login() {
    let server = MockBookHub::start().await;
    let client = server.client();
    let token = server.seed_admin_session(&client);
    server.expire_token(&token);

    let result = RentalService::new(client.api.clone()).history().await;

    assert!(matches!(result, Err(ApiError::SessionEnded { redirect: "/admin/login" })));
    assert_eq!(client.navigator.redirects(), vec!["/admin/login".to_string()]);
}

#[tokio::test]
async fn test_admin_endpoint_with_member_session_never_refreshes() {
    let server = MockBookHub::start().await;
    let client = server.client();
    let token = server.seed_member_session(&client);
    server.expire_token(&token);

    let result: Result<serde_json::Value, _> = client.api.get("/admin/books").await;

    assert!(matches!(result, Err(ApiError::SessionEnded { redirect: "/admin/login" })));
    assert!(server.requests_to("/auth/refresh-token").is_empty());
}

// =============================================================================
// Other statuses
// =============================================================================

#[tokio::test]
async fn test_forbidden_keeps_session() {
    let server = MockBookHub::start().await;
    let client = server.client();
    server.seed_member_session(&client);

    let result: Result<serde_json::Value, _> = client.api.get("/membership/reports").await;

    let err = result.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(ref m) if m == "Premium membership required"));
    assert_eq!(err.user_message(), "You do not have permission to do that.");
    assert!(client.credentials().active_session().is_authenticated());
    assert!(client.navigator.redirects().is_empty());
}

#[tokio::test]
async fn test_server_error_is_generic() {
    let server = MockBookHub::start().await;
    let client = server.client();

    let err = client
        .api
        .get::<serde_json::Value>("/books/broken")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Server { .. }));
    assert!(!err.user_message().contains("pool"));
    assert_eq!(server.requests_to("/books/broken").len(), 1);
}

#[tokio::test]
async fn test_not_found_is_validation() {
    let server = MockBookHub::start().await;
    let client = server.client();

    let err = client
        .api
        .get::<serde_json::Value>("/no/such/route")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Validation { status, .. } if status.as_u16() == 404));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Bind and release a port so nothing is listening on it.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let server = MockBookHub::start().await;
    let config = ClientConfig::new(&format!("http://{addr}")).unwrap();
    let client = server.client_with(config, "/");
    server.seed_member_session(&client);

    let result = RentalService::new(client.api.clone()).history().await;

    let err = result.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(
        err.user_message(),
        "Unable to reach BookHub. Check your connection and try again."
    );
    assert!(client.credentials().active_session().is_authenticated());
}
