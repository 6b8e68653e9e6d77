//! Session identity and route guards.
//!
//! A session is exactly one of guest, regular user or admin. Code that
//! needs to know "who is this" matches on [`Session`] instead of comparing
//! role strings, so an admin can never fall through a user branch.

use bookhub_core::{Role, User};
use secrecy::SecretString;

/// Route a regular user is sent to when their session ends.
pub const USER_LOGIN_ROUTE: &str = "/login";

/// Route an admin is sent to when their session ends.
pub const ADMIN_LOGIN_ROUTE: &str = "/admin/login";

/// Landing page for admins who wander onto member pages.
pub const ADMIN_HOME_ROUTE: &str = "/admin/dashboard";

/// Tokens and identity of a signed-in account.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Bearer token attached to requests.
    pub access_token: SecretString,
    /// Token used to mint a new access token (regular sessions only).
    pub refresh_token: Option<SecretString>,
    /// The signed-in account.
    pub user: User,
}

/// Who the client is acting as.
#[derive(Debug, Clone, Default)]
pub enum Session {
    /// Nobody is signed in.
    #[default]
    Guest,
    /// A regular member.
    User(Credentials),
    /// A back-office administrator.
    Admin(Credentials),
}

impl Session {
    /// Whether someone is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Guest)
    }

    /// Role of the signed-in account.
    #[must_use]
    pub const fn role(&self) -> Option<Role> {
        match self {
            Self::Guest => None,
            Self::User(_) => Some(Role::User),
            Self::Admin(_) => Some(Role::Admin),
        }
    }

    /// The signed-in account.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Guest => None,
            Self::User(credentials) | Self::Admin(credentials) => Some(&credentials.user),
        }
    }

    /// Tokens of the signed-in account.
    #[must_use]
    pub const fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Guest => None,
            Self::User(credentials) | Self::Admin(credentials) => Some(credentials),
        }
    }

    /// Where this session is sent when it ends.
    #[must_use]
    pub const fn login_route(&self) -> &'static str {
        match self {
            Self::Guest | Self::User(_) => USER_LOGIN_ROUTE,
            Self::Admin(_) => ADMIN_LOGIN_ROUTE,
        }
    }

    /// Replace the account of a signed-in session, keeping its tokens.
    ///
    /// Returns `None` if the new account's role does not match the session
    /// variant; a role change is never applied silently.
    #[must_use]
    pub fn with_user(&self, user: User) -> Option<Self> {
        match (self, user.role) {
            (Self::User(credentials), Role::User) => Some(Self::User(Credentials {
                user,
                ..credentials.clone()
            })),
            (Self::Admin(credentials), Role::Admin) => Some(Self::Admin(Credentials {
                user,
                ..credentials.clone()
            })),
            _ => None,
        }
    }
}

/// Who may open a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone.
    Public,
    /// Signed-in regular members (cart, checkout, rentals, profile).
    Member,
    /// Signed-in admins.
    Admin,
}

/// Outcome of a route guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the page.
    Allow,
    /// Send the client elsewhere.
    Redirect(&'static str),
}

/// Decide whether `session` may open a page requiring `access`.
#[must_use]
pub const fn guard(session: &Session, access: Access) -> GuardDecision {
    match (access, session) {
        (Access::Public, _)
        | (Access::Member, Session::User(_))
        | (Access::Admin, Session::Admin(_)) => GuardDecision::Allow,
        (Access::Member, Session::Guest) => GuardDecision::Redirect(USER_LOGIN_ROUTE),
        (Access::Member, Session::Admin(_)) => GuardDecision::Redirect(ADMIN_HOME_ROUTE),
        (Access::Admin, Session::Guest | Session::User(_)) => {
            GuardDecision::Redirect(ADMIN_LOGIN_ROUTE)
        }
    }
}
