//! Auth state and its reducer.

use bookhub_core::User;

use crate::session::Session;

/// Published auth state.
#[derive(Debug, Clone, Default)]
pub enum AuthState {
    /// Storage has not been read yet.
    #[default]
    Loading,
    /// The session is known. `Ready(Session::Guest)` is "signed out".
    Ready(Session),
}

impl AuthState {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::Loading => None,
            Self::Ready(session) => Some(session),
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Ready(session) if session.is_authenticated())
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.session().and_then(Session::user)
    }
}

/// Everything that can happen to the auth state.
#[derive(Debug, Clone)]
pub enum AuthAction {
    /// Session rebuilt from storage at startup.
    Restored(Session),
    /// The server confirmed the token and returned the current account.
    Validated(User),
    /// Login, admin login or registration succeeded.
    SignedIn(Session),
    /// The account was edited.
    ProfileUpdated(User),
    /// Logout or an unrecoverable 401.
    SignedOut,
}

/// Compute the next state.
///
/// Account updates only apply to a signed-in session of the same role. An
/// account whose role contradicts the session ends it; an update arriving
/// while nobody is signed in is dropped.
#[must_use]
pub fn reduce(state: &AuthState, action: AuthAction) -> AuthState {
    match action {
        AuthAction::Restored(session) | AuthAction::SignedIn(session) => AuthState::Ready(session),
        AuthAction::SignedOut => AuthState::Ready(Session::Guest),
        AuthAction::Validated(user) | AuthAction::ProfileUpdated(user) => match state {
            AuthState::Ready(session) if session.is_authenticated() => {
                AuthState::Ready(session.with_user(user).unwrap_or_default())
            }
            other => other.clone(),
        },
    }
}
