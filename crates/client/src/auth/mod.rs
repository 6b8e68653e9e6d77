//! Authentication context.
//!
//! [`AuthContext`] owns the process-wide auth state. It is restored from the
//! credential store at startup, validated against the server, and mutated
//! only through sign-in, sign-out and account updates. Every transition goes
//! through [`reduce`], and observers follow along through a `watch` channel.
//!
//! Operations return [`AuthFailure`] with a user-facing message instead of
//! transport errors, except [`AuthContext::fetch_user_data`].

mod error;
mod state;

use std::sync::Arc;

use bookhub_core::{Email, Role, User};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::instrument;

pub use error::AuthFailure;
pub use state::{AuthAction, AuthState, reduce};

use crate::config::AdminSessionPolicy;
use crate::credentials::UserRecord;
use crate::error::{ApiError, clear_sentry_user, set_sentry_user};
use crate::http::{ApiClient, ApiRequest};
use crate::session::{Credentials, Session};

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

const LOGIN_PATH: &str = "/auth/login";
const ADMIN_LOGIN_PATH: &str = "/admin/login";
const SIGNUP_PATH: &str = "/auth/signup";
const VALIDATE_PATH: &str = "/auth/validate-token";
const UPDATE_PROFILE_PATH: &str = "/auth/update-profile";

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest<'a> {
    full_name: &'a str,
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

/// Response of the credential-issuing endpoints.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    #[serde(alias = "accessToken")]
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(alias = "admin")]
    user: UserRecord,
}

#[derive(Deserialize)]
struct UserEnvelope {
    #[serde(alias = "admin")]
    user: UserRecord,
}

/// New account details.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub full_name: String,
    pub email: String,
    pub password: SecretString,
    pub phone: Option<String>,
}

/// Account fields to change. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

// =============================================================================
// AuthContext
// =============================================================================

/// Process-wide authentication state.
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<AuthContextInner>,
}

struct AuthContextInner {
    api: ApiClient,
    state: watch::Sender<AuthState>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl AuthContext {
    /// Create a context in the `Loading` state. Call
    /// [`initialize`](Self::initialize) before relying on it.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self {
            inner: Arc::new(AuthContextInner { api, state }),
        }
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Follow state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// Current session; `Guest` while loading.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.state.borrow().session().cloned().unwrap_or_default()
    }

    fn dispatch(&self, action: AuthAction) {
        self.inner.state.send_modify(|state| *state = reduce(state, action));
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Restore the session from storage and validate it.
    ///
    /// The stored session is published immediately. A regular session is
    /// then checked against the server: success refreshes the account, a
    /// 401 signs out, anything else keeps the stored session.
    /// Admin sessions follow the configured [`AdminSessionPolicy`].
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> AuthState {
        let session = self.api().credentials().active_session();
        if let Some(user) = session.user() {
            set_sentry_user(user);
        }
        self.dispatch(AuthAction::Restored(session.clone()));

        match session {
            Session::Guest => tracing::debug!("no stored session"),
            Session::Admin(credentials) => match self.api().config().admin_session_policy {
                AdminSessionPolicy::TrustLocal => {
                    tracing::warn!(
                        user_id = %credentials.user.id,
                        "trusting stored admin session without server validation"
                    );
                }
                AdminSessionPolicy::Validate => self.validate_stored_session().await,
            },
            Session::User(_) => self.validate_stored_session().await,
        }

        self.state()
    }

    async fn validate_stored_session(&self) {
        match self.fetch_user_data().await {
            Ok(user) => {
                if let Err(failure) = self.apply_user(user, AuthAction::Validated) {
                    tracing::warn!(error = %failure, "stored session rejected");
                }
            }
            Err(e) => match self.sign_out_if_rejected(e) {
                e if e.ended_session() => tracing::info!("stored session is no longer valid"),
                e => tracing::warn!(error = %e, "could not validate stored session, keeping it"),
            },
        }
    }

    // =========================================================================
    // Sign in / out
    // =========================================================================

    /// Sign in as a regular member.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` for invalid input, rejected credentials, an
    /// admin account, or a transport failure. An existing session is left
    /// untouched on failure.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<User, AuthFailure> {
        let email = Email::parse(email).map_err(|e| AuthFailure::new(e.to_string()))?;
        if password.expose_secret().is_empty() {
            return Err(AuthFailure::new("Password is required"));
        }

        let response = self
            .issue_credentials(
                LOGIN_PATH,
                &LoginRequest {
                    email: email.as_str(),
                    password: password.expose_secret(),
                },
            )
            .await?;

        if response.user.stated_role() == Some(Role::Admin) {
            tracing::warn!("admin account used the member login");
            return Err(AuthFailure::new("Admin accounts must sign in through the admin login"));
        }

        self.sign_in(Session::User(Credentials {
            access_token: SecretString::from(response.token),
            refresh_token: response.refresh_token.map(SecretString::from),
            user: response.user.resolve(Role::User),
        }))
    }

    /// Sign in to the back office.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` for invalid input, rejected credentials, a
    /// non-admin account, or a transport failure.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn admin_login(&self, email: &str, password: &SecretString) -> Result<User, AuthFailure> {
        let email = Email::parse(email).map_err(|e| AuthFailure::new(e.to_string()))?;
        if password.expose_secret().is_empty() {
            return Err(AuthFailure::new("Password is required"));
        }

        let response = self
            .issue_credentials(
                ADMIN_LOGIN_PATH,
                &LoginRequest {
                    email: email.as_str(),
                    password: password.expose_secret(),
                },
            )
            .await?;

        if response.user.stated_role().is_some_and(|role| role != Role::Admin) {
            tracing::warn!("non-admin account used the admin login");
            return Err(AuthFailure::new("This account does not have admin access"));
        }

        self.sign_in(Session::Admin(Credentials {
            access_token: SecretString::from(response.token),
            refresh_token: None,
            user: response.user.resolve(Role::Admin),
        }))
    }

    /// Create a member account and sign in with it.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` for invalid input, a rejected registration
    /// (e.g. email already in use), or a transport failure.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: &RegisterInput) -> Result<User, AuthFailure> {
        let full_name = input.full_name.trim();
        if full_name.is_empty() {
            return Err(AuthFailure::new("Full name is required"));
        }
        let email = Email::parse(&input.email).map_err(|e| AuthFailure::new(e.to_string()))?;
        if input.password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthFailure::new(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let response = self
            .issue_credentials(
                SIGNUP_PATH,
                &SignupRequest {
                    full_name,
                    email: email.as_str(),
                    password: input.password.expose_secret(),
                    phone: input.phone.as_deref().filter(|p| !p.trim().is_empty()),
                },
            )
            .await?;

        if response.user.stated_role() == Some(Role::Admin) {
            return Err(AuthFailure::new("Registration returned an admin account"));
        }

        self.sign_in(Session::User(Credentials {
            access_token: SecretString::from(response.token),
            refresh_token: response.refresh_token.map(SecretString::from),
            user: response.user.resolve(Role::User),
        }))
    }

    /// Sign out: clear storage and hard-navigate to the login route of the
    /// role that was signed in.
    pub fn logout(&self) {
        let route = self.session().login_route();

        self.api().credentials().clear();
        clear_sentry_user();
        self.dispatch(AuthAction::SignedOut);
        self.api().navigator().navigate(route);

        tracing::info!(redirect = route, "signed out");
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// Fetch the signed-in account from the server.
    ///
    /// # Errors
    ///
    /// Returns the underlying `ApiError`.
    #[instrument(skip(self))]
    pub async fn fetch_user_data(&self) -> Result<User, ApiError> {
        let envelope: UserEnvelope = self.api().get(VALIDATE_PATH).await?;
        Ok(envelope.user.resolve(self.expected_role()))
    }

    /// Re-fetch the signed-in account and publish it.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if nobody is signed in, the request fails, or
    /// the account's role no longer matches the session.
    #[instrument(skip(self))]
    pub async fn refresh_user_data(&self) -> Result<User, AuthFailure> {
        self.require_session()?;
        let user = self.fetch_user_data().await.map_err(|e| self.failure(e))?;
        self.apply_user(user, AuthAction::Validated)
    }

    /// Edit the signed-in account.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if nobody is signed in, a field is invalid, the
    /// server rejects the change, or the account's role no longer matches
    /// the session.
    #[instrument(skip(self, update))]
    pub async fn update_user_profile(&self, update: &ProfileUpdate) -> Result<User, AuthFailure> {
        self.require_session()?;

        let mut update = update.clone();
        if let Some(name) = update.full_name.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() {
                return Err(AuthFailure::new("Full name is required"));
            }
        }
        if let Some(email) = update.email.as_mut() {
            *email = Email::parse(email)
                .map_err(|e| AuthFailure::new(e.to_string()))?
                .into_inner();
        }

        let envelope: UserEnvelope = self
            .api()
            .put(UPDATE_PROFILE_PATH, &update)
            .await
            .map_err(|e| self.failure(e))?;
        let user = envelope.user.resolve(self.expected_role());
        self.apply_user(user, AuthAction::ProfileUpdated)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn issue_credentials<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AuthResponse, AuthFailure> {
        let request = ApiRequest::post(path)
            .json(body)
            .map_err(|e| AuthFailure::from(&e))?
            .without_session_recovery();

        let response: AuthResponse = self.api().send(request).await.map_err(|e| {
            tracing::info!(path, error = %e, "sign-in rejected");
            AuthFailure::sign_in(&e)
        })?;

        if response.token.trim().is_empty() {
            return Err(AuthFailure::new("Sign-in did not return a token"));
        }
        Ok(response)
    }

    fn sign_in(&self, session: Session) -> Result<User, AuthFailure> {
        let Some(user) = session.user().cloned() else {
            return Err(AuthFailure::new("Sign-in did not return an account"));
        };

        self.api().credentials().save_session(&session).map_err(|e| {
            tracing::error!(error = %e, "failed to persist session");
            AuthFailure::new("Unable to save your session")
        })?;

        set_sentry_user(&user);
        tracing::info!(user_id = %user.id, role = %user.role, "signed in");
        self.dispatch(AuthAction::SignedIn(session));
        Ok(user)
    }

    /// Publish a fresh account for the live session, ending the session if
    /// the role changed underneath it.
    fn apply_user(&self, user: User, action: fn(User) -> AuthAction) -> Result<User, AuthFailure> {
        let session = self.session();
        if !session.is_authenticated() {
            return Err(AuthFailure::new("You are not signed in"));
        }

        if session.with_user(user.clone()).is_none() {
            tracing::warn!(
                user_id = %user.id,
                role = %user.role,
                "account role no longer matches the session"
            );
            let error = self.api().end_session(session.login_route());
            self.dispatch(AuthAction::SignedOut);
            return Err(AuthFailure::from(&error));
        }

        if let Err(e) = self.api().credentials().update_user(&user) {
            tracing::warn!(error = %e, "failed to store updated account");
        }
        self.dispatch(action(user.clone()));
        Ok(user)
    }

    fn require_session(&self) -> Result<(), AuthFailure> {
        if self.session().is_authenticated() {
            Ok(())
        } else {
            Err(AuthFailure::new("You are not signed in"))
        }
    }

    fn expected_role(&self) -> Role {
        self.session().role().unwrap_or_default()
    }

    /// Convert an API error, signing out when the server rejected the
    /// session.
    fn failure(&self, error: ApiError) -> AuthFailure {
        AuthFailure::from(&self.sign_out_if_rejected(error))
    }

    /// A 401 that survived the pipeline's recovery ends the session like
    /// one it could not recover. Returns the error to report.
    fn sign_out_if_rejected(&self, error: ApiError) -> ApiError {
        if error.is_unauthorized() {
            tracing::info!(error = %error, "session rejected after recovery");
            let ended = self.api().end_session(self.session().login_route());
            self.dispatch(AuthAction::SignedOut);
            return ended;
        }
        if error.ended_session() {
            self.dispatch(AuthAction::SignedOut);
        }
        error
    }
}
