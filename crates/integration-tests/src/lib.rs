//! Integration tests for the BookHub client.
//!
//! The tests run the client against [`MockBookHub`], an in-process axum
//! server that speaks the BookHub REST API: bearer tokens, refresh tokens,
//! sign-in, rentals and recommendations. Every request the server sees is
//! recorded so tests can assert on retries and headers.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bookhub-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `interceptor` - bearer attachment, 401 refresh-and-retry, redirects
//! - `auth_context` - sign-in, registration, validation, logout
//! - `member_flows` - checkout, rentals, recommendations

#![allow(clippy::missing_panics_doc, clippy::must_use_candidate)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use bookhub_client::{
    ApiClient, ClientConfig, CredentialStore, Credentials, MemoryNavigator, MemoryStore, Session,
};
use bookhub_core::{Email, Role, User, UserId};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Password of every seeded account.
pub const PASSWORD: &str = "secret123";

/// Seeded member.
pub const READER_ID: &str = "u1";
pub const READER_EMAIL: &str = "reader@bookhub.io";

/// Seeded admin.
pub const ADMIN_ID: &str = "a1";
pub const ADMIN_EMAIL: &str = "admin@bookhub.io";

// =============================================================================
// Server state
// =============================================================================

/// A request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
struct MockUser {
    id: String,
    email: String,
    full_name: String,
    role: Role,
    phone: Option<String>,
    password: String,
}

impl MockUser {
    fn to_json(&self) -> Value {
        json!({
            "_id": self.id,
            "email": self.email,
            "fullName": self.full_name,
            "role": self.role,
            "phone": self.phone,
        })
    }
}

struct MockState {
    users: Mutex<HashMap<String, MockUser>>,
    /// access token -> user id
    tokens: Mutex<HashMap<String, String>>,
    /// refresh token -> user id
    refresh_tokens: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<RecordedRequest>>,
    batch_response: Mutex<Value>,
    batch_bodies: Mutex<Vec<Value>>,
    recommendations_delay: Mutex<Duration>,
    reject_all_tokens: AtomicBool,
    fail_refresh: AtomicBool,
    counter: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockState {
    fn seeded() -> Self {
        let users = [
            MockUser {
                id: READER_ID.to_string(),
                email: READER_EMAIL.to_string(),
                full_name: "Riley Reader".to_string(),
                role: Role::User,
                phone: None,
                password: PASSWORD.to_string(),
            },
            MockUser {
                id: ADMIN_ID.to_string(),
                email: ADMIN_EMAIL.to_string(),
                full_name: "Avery Admin".to_string(),
                role: Role::Admin,
                phone: None,
                password: PASSWORD.to_string(),
            },
        ];

        Self {
            users: Mutex::new(users.into_iter().map(|u| (u.id.clone(), u)).collect()),
            tokens: Mutex::new(HashMap::new()),
            refresh_tokens: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            batch_response: Mutex::new(json!({
                "success": true,
                "rentalsCreated": 0,
                "unavailableBooks": []
            })),
            batch_bodies: Mutex::new(Vec::new()),
            recommendations_delay: Mutex::new(Duration::ZERO),
            reject_all_tokens: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            counter: AtomicU32::new(0),
        }
    }

    fn next_id(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn issue_token(&self, user_id: &str) -> String {
        let token = format!("access-{}", self.next_id());
        lock(&self.tokens).insert(token.clone(), user_id.to_string());
        token
    }

    fn issue_refresh_token(&self, user_id: &str) -> String {
        let token = format!("refresh-{}", self.next_id());
        lock(&self.refresh_tokens).insert(token.clone(), user_id.to_string());
        token
    }

    fn find_by_email(&self, email: &str) -> Option<MockUser> {
        lock(&self.users).values().find(|u| u.email == email).cloned()
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<MockUser, Response> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "No token provided"))?;

        if self.reject_all_tokens.load(Ordering::SeqCst) {
            return Err(error(StatusCode::UNAUTHORIZED, "Token expired"));
        }

        let user_id = lock(&self.tokens)
            .get(token)
            .cloned()
            .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;
        lock(&self.users)
            .get(&user_id)
            .cloned()
            .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Account not found"))
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

async fn record(State(state): State<Arc<MockState>>, request: Request, next: Next) -> Response {
    let recorded = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        RecordedRequest {
            method: request.method().to_string(),
            path: request.uri().path().to_owned(),
            authorization: header("authorization"),
            request_id: header("x-request-id"),
        }
    };
    lock(&state.requests).push(recorded);
    next.run(request).await
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<LoginBody>) -> Response {
    let Some(user) = state
        .find_by_email(&body.email)
        .filter(|u| u.password == body.password)
    else {
        return error(StatusCode::UNAUTHORIZED, "Invalid credentials");
    };

    Json(json!({
        "token": state.issue_token(&user.id),
        "refreshToken": state.issue_refresh_token(&user.id),
        "user": user.to_json(),
    }))
    .into_response()
}

async fn admin_login(State(state): State<Arc<MockState>>, Json(body): Json<LoginBody>) -> Response {
    let Some(user) = state
        .find_by_email(&body.email)
        .filter(|u| u.password == body.password)
    else {
        return error(StatusCode::UNAUTHORIZED, "Invalid credentials");
    };

    let token = state.issue_token(&user.id);
    if user.role == Role::Admin {
        // Admin objects come back without a role field.
        Json(json!({
            "token": token,
            "admin": { "_id": user.id, "email": user.email, "name": user.full_name },
        }))
        .into_response()
    } else {
        Json(json!({ "token": token, "user": user.to_json() })).into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupBody {
    full_name: String,
    email: String,
    password: String,
    #[serde(default)]
    phone: Option<String>,
}

async fn signup(State(state): State<Arc<MockState>>, Json(body): Json<SignupBody>) -> Response {
    if state.find_by_email(&body.email).is_some() {
        return error(StatusCode::CONFLICT, "Email already registered");
    }

    let user = MockUser {
        id: format!("u{}", 100 + state.next_id()),
        email: body.email,
        full_name: body.full_name,
        role: Role::User,
        phone: body.phone,
        password: body.password,
    };
    lock(&state.users).insert(user.id.clone(), user.clone());

    (
        StatusCode::CREATED,
        Json(json!({
            "token": state.issue_token(&user.id),
            "refreshToken": state.issue_refresh_token(&user.id),
            "user": user.to_json(),
        })),
    )
        .into_response()
}

async fn validate_token(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    match state.authenticate(&headers) {
        Ok(user) => Json(json!({ "user": user.to_json() })).into_response(),
        Err(response) => response,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileBody {
    full_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

async fn update_profile(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<ProfileBody>,
) -> Response {
    let user = match state.authenticate(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let mut users = lock(&state.users);
    let Some(stored) = users.get_mut(&user.id) else {
        return error(StatusCode::NOT_FOUND, "Account not found");
    };
    if let Some(name) = body.full_name {
        stored.full_name = name;
    }
    if let Some(email) = body.email {
        stored.email = email;
    }
    if let Some(phone) = body.phone {
        stored.phone = Some(phone);
    }
    Json(json!({ "message": "Profile updated", "user": stored.to_json() })).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    refresh_token: String,
}

async fn refresh_token(State(state): State<Arc<MockState>>, Json(body): Json<RefreshBody>) -> Response {
    if state.fail_refresh.load(Ordering::SeqCst) {
        return error(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }
    let Some(user_id) = lock(&state.refresh_tokens).get(&body.refresh_token).cloned() else {
        return error(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    };

    Json(json!({ "accessToken": state.issue_token(&user_id) })).into_response()
}

async fn rental_batch(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    match state.authenticate(&headers) {
        Ok(user) if user.role == Role::User => {
            lock(&state.batch_bodies).push(body);
            Json(lock(&state.batch_response).clone()).into_response()
        }
        Ok(_) => error(StatusCode::FORBIDDEN, "Admins cannot rent books"),
        Err(response) => response,
    }
}

fn rental_json(id: &str, user_id: &str, returned: bool) -> Value {
    json!({
        "_id": id,
        "userId": user_id,
        "bookId": "b1",
        "title": "The Left Hand of Darkness",
        "startDate": "2026-01-01T00:00:00Z",
        "dueDate": "2026-01-15T00:00:00Z",
        "isReturned": returned,
    })
}

async fn rental_history(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    match state.authenticate(&headers) {
        Ok(user) => Json(json!({
            "rentals": [rental_json("r1", &user.id, false), rental_json("r2", &user.id, true)]
        }))
        .into_response(),
        Err(response) => response,
    }
}

async fn return_rental(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    match state.authenticate(&headers) {
        Ok(user) => Json(json!({
            "message": "Book returned",
            "rental": rental_json(&id, &user.id, true),
        }))
        .into_response(),
        Err(response) => response,
    }
}

async fn recommendations(State(state): State<Arc<MockState>>) -> Response {
    let delay = *lock(&state.recommendations_delay);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    Json(json!([
        { "_id": "b7", "title": "Kindred", "author": "Octavia E. Butler", "price": "14.99" },
        { "_id": "b8", "title": "Piranesi" }
    ]))
    .into_response()
}

async fn admin_books(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    match state.authenticate(&headers) {
        Ok(user) if user.role == Role::Admin => Json(json!([])).into_response(),
        Ok(_) => error(StatusCode::FORBIDDEN, "Admin access required"),
        Err(response) => response,
    }
}

async fn reports(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    match state.authenticate(&headers) {
        Ok(_) => error(StatusCode::FORBIDDEN, "Premium membership required"),
        Err(response) => response,
    }
}

async fn broken() -> Response {
    error(StatusCode::INTERNAL_SERVER_ERROR, "connection pool exhausted")
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/signup", post(signup))
        .route("/auth/validate-token", get(validate_token))
        .route("/auth/update-profile", put(update_profile))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/admin/login", post(admin_login))
        .route("/admin/books", get(admin_books))
        .route("/rentals/batch", post(rental_batch))
        .route("/rentals/history", get(rental_history))
        .route("/rentals/return/{id}", post(return_rental))
        .route("/books/recommendations", get(recommendations))
        .route("/membership/reports", get(reports))
        .route("/books/broken", get(broken))
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

// =============================================================================
// Test harness
// =============================================================================

/// A client wired to a mock server, with handles on its storage and
/// navigator.
pub struct TestClient {
    pub api: ApiClient,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<MemoryNavigator>,
}

impl TestClient {
    pub fn credentials(&self) -> &CredentialStore {
        self.api.credentials()
    }
}

/// In-process BookHub API.
pub struct MockBookHub {
    addr: SocketAddr,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl Drop for MockBookHub {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl MockBookHub {
    /// Start a server on an ephemeral loopback port.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::seeded());
        let app = router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Mock server has no address");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock server error");
        });

        Self { addr, state, server }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.url()).expect("Mock server URL should be valid")
    }

    /// A client starting on `/` with empty storage.
    pub fn client(&self) -> TestClient {
        self.client_with(self.config(), "/")
    }

    pub fn client_with(&self, config: ClientConfig, start_path: &str) -> TestClient {
        let store = Arc::new(MemoryStore::new());
        let navigator = Arc::new(MemoryNavigator::new(start_path));
        let api = ApiClient::new(config, CredentialStore::new(store.clone()), navigator.clone())
            .expect("Failed to build client");
        TestClient {
            api,
            store,
            navigator,
        }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Store a valid member session; returns the access token.
    pub fn seed_member_session(&self, client: &TestClient) -> String {
        let token = self.state.issue_token(READER_ID);
        let refresh = self.state.issue_refresh_token(READER_ID);
        let session = Session::User(Credentials {
            access_token: SecretString::from(token.clone()),
            refresh_token: Some(SecretString::from(refresh)),
            user: self.user(READER_ID),
        });
        client
            .credentials()
            .save_session(&session)
            .expect("Failed to seed session");
        token
    }

    /// Store a valid admin session; returns the access token.
    pub fn seed_admin_session(&self, client: &TestClient) -> String {
        let token = self.state.issue_token(ADMIN_ID);
        let session = Session::Admin(Credentials {
            access_token: SecretString::from(token.clone()),
            refresh_token: None,
            user: self.user(ADMIN_ID),
        });
        client
            .credentials()
            .save_session(&session)
            .expect("Failed to seed session");
        token
    }

    /// The seeded account as the client models it.
    pub fn user(&self, id: &str) -> User {
        let users = lock(&self.state.users);
        let user = users.get(id).expect("Unknown mock user");
        User {
            id: UserId::new(&user.id),
            email: Email::parse(&user.email).expect("Mock email should be valid"),
            full_name: user.full_name.clone(),
            role: user.role,
            phone: user.phone.clone(),
        }
    }

    /// Invalidate one access token.
    pub fn expire_token(&self, token: &str) {
        lock(&self.state.tokens).remove(token);
    }

    /// Answer 401 to every authenticated request.
    pub fn reject_all_tokens(&self) {
        self.state.reject_all_tokens.store(true, Ordering::SeqCst);
    }

    /// Answer 401 to every refresh exchange.
    pub fn fail_refresh(&self) {
        self.state.fail_refresh.store(true, Ordering::SeqCst);
    }

    /// Change an account's role server-side.
    pub fn set_role(&self, id: &str, role: Role) {
        if let Some(user) = lock(&self.state.users).get_mut(id) {
            user.role = role;
        }
    }

    /// Change an account's name server-side.
    pub fn rename(&self, id: &str, full_name: &str) {
        if let Some(user) = lock(&self.state.users).get_mut(id) {
            user.full_name = full_name.to_string();
        }
    }

    // =========================================================================
    // Canned responses
    // =========================================================================

    pub fn set_batch_response(&self, response: Value) {
        *lock(&self.state.batch_response) = response;
    }

    /// Bodies posted to `/rentals/batch`.
    pub fn batch_bodies(&self) -> Vec<Value> {
        lock(&self.state.batch_bodies).clone()
    }

    pub fn delay_recommendations(&self, delay: Duration) {
        *lock(&self.state.recommendations_delay) = delay;
    }

    // =========================================================================
    // Request log
    // =========================================================================

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.requests).clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }
}
