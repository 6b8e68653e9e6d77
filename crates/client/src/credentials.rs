//! Credential storage.
//!
//! Tokens and user objects live in the durable [`KeyValueStore`] under the
//! keys in [`storage::keys`](crate::storage::keys). Regular and admin
//! sessions use separate slots; admin slots win on read. Anything that
//! fails to parse is treated as absent, so a damaged store degrades to
//! "signed out" rather than an error.

use std::sync::Arc;

use bookhub_core::{Email, Role, User, UserId};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::session::{Credentials, Session};
use crate::storage::{KeyValueStore, StorageError, keys};

/// User object as stored locally or returned by sign-in endpoints.
///
/// The role is optional: older admin responses omit it, so the slot (or
/// endpoint) the record came from supplies the default.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserRecord {
    #[serde(alias = "_id")]
    id: UserId,
    email: Email,
    #[serde(default, alias = "name")]
    full_name: String,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    phone: Option<String>,
}

impl UserRecord {
    /// Resolve the record for a slot expecting `expected`.
    ///
    /// Returns `None` when the record carries a different explicit role.
    pub(crate) fn into_user(self, expected: Role) -> Option<User> {
        let user = self.resolve(expected);
        (user.role == expected).then_some(user)
    }

    /// Build the user, taking `default` when the record states no role.
    pub(crate) fn resolve(self, default: Role) -> User {
        User {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            role: self.role.unwrap_or(default),
            phone: self.phone,
        }
    }

    /// Role stated by the record itself, if any.
    pub(crate) const fn stated_role(&self) -> Option<Role> {
        self.role
    }
}

/// Reads and writes session credentials in durable storage.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("session", &self.active_session().role())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Create a credential store over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// The underlying key-value store.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Token to attach to outgoing requests: the first present of the admin
    /// token, the legacy auth token and the regular token.
    #[must_use]
    pub fn active_token(&self) -> Option<SecretString> {
        [keys::ADMIN_TOKEN, keys::AUTH_TOKEN, keys::TOKEN]
            .into_iter()
            .find_map(|key| self.read_token(key))
    }

    /// The stored account, preferring the admin slot.
    #[must_use]
    pub fn active_user(&self) -> Option<User> {
        self.read_user(keys::ADMIN_USER, Role::Admin)
            .or_else(|| self.read_user(keys::USER, Role::User))
    }

    /// Refresh token of the regular session.
    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.read_token(keys::REFRESH_TOKEN)
    }

    /// Rebuild the session from storage.
    ///
    /// A session needs both a token and a user in matching slots; anything
    /// less is a guest.
    #[must_use]
    pub fn active_session(&self) -> Session {
        if let (Some(access_token), Some(user)) = (
            self.read_token(keys::ADMIN_TOKEN),
            self.read_user(keys::ADMIN_USER, Role::Admin),
        ) {
            return Session::Admin(Credentials {
                access_token,
                refresh_token: None,
                user,
            });
        }

        let user_token = self
            .read_token(keys::AUTH_TOKEN)
            .or_else(|| self.read_token(keys::TOKEN));
        if let (Some(access_token), Some(user)) = (user_token, self.read_user(keys::USER, Role::User)) {
            return Session::User(Credentials {
                access_token,
                refresh_token: self.refresh_token(),
                user,
            });
        }

        Session::Guest
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persist `session`, replacing whatever was stored. A guest clears.
    ///
    /// Writing one kind of session removes the other kind's keys so the
    /// store never holds both.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects a write.
    pub fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        match session {
            Session::Guest => {
                self.clear();
                Ok(())
            }
            Session::User(credentials) => {
                for key in [keys::ADMIN_TOKEN, keys::ADMIN_USER, keys::AUTH_TOKEN] {
                    self.backend.remove(key)?;
                }
                self.backend
                    .set(keys::TOKEN, credentials.access_token.expose_secret())?;
                match &credentials.refresh_token {
                    Some(refresh) => self.backend.set(keys::REFRESH_TOKEN, refresh.expose_secret())?,
                    None => self.backend.remove(keys::REFRESH_TOKEN)?,
                }
                self.write_user(keys::USER, &credentials.user)
            }
            Session::Admin(credentials) => {
                for key in [keys::TOKEN, keys::AUTH_TOKEN, keys::REFRESH_TOKEN, keys::USER] {
                    self.backend.remove(key)?;
                }
                self.backend
                    .set(keys::ADMIN_TOKEN, credentials.access_token.expose_secret())?;
                self.write_user(keys::ADMIN_USER, &credentials.user)
            }
        }
    }

    /// Persist a regular session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects a write.
    pub fn save_user_session(
        &self,
        access_token: SecretString,
        refresh_token: Option<SecretString>,
        user: User,
    ) -> Result<(), StorageError> {
        self.save_session(&Session::User(Credentials {
            access_token,
            refresh_token,
            user,
        }))
    }

    /// Persist an admin session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects a write.
    pub fn save_admin_session(&self, access_token: SecretString, user: User) -> Result<(), StorageError> {
        self.save_session(&Session::Admin(Credentials {
            access_token,
            refresh_token: None,
            user,
        }))
    }

    /// Store an access token obtained by refreshing the regular session.
    ///
    /// The legacy auth token is overwritten too when present, otherwise it
    /// would keep winning the [`active_token`](Self::active_token) lookup.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects a write.
    pub fn store_access_token(&self, token: &SecretString) -> Result<(), StorageError> {
        self.backend.set(keys::TOKEN, token.expose_secret())?;
        if self.backend.get(keys::AUTH_TOKEN).is_some() {
            self.backend.set(keys::AUTH_TOKEN, token.expose_secret())?;
        }
        Ok(())
    }

    /// Store a rotated refresh token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the write.
    pub fn store_refresh_token(&self, token: &SecretString) -> Result<(), StorageError> {
        self.backend.set(keys::REFRESH_TOKEN, token.expose_secret())
    }

    /// Rewrite the stored account in the slot matching its role.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects a write.
    pub fn update_user(&self, user: &User) -> Result<(), StorageError> {
        match user.role {
            Role::User => self.write_user(keys::USER, user),
            Role::Admin => self.write_user(keys::ADMIN_USER, user),
        }
    }

    /// Remove every credential key and the recommendations cache.
    ///
    /// Failures are logged and the remaining keys are still removed.
    pub fn clear(&self) {
        for key in keys::CLEARED_ON_LOGOUT {
            if let Err(e) = self.backend.remove(key) {
                tracing::warn!(key, error = %e, "failed to remove stored credential");
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn read_token(&self, key: &str) -> Option<SecretString> {
        self.backend
            .get(key)
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::from)
    }

    fn read_user(&self, key: &str, slot_role: Role) -> Option<User> {
        let raw = self.backend.get(key)?;
        let record: UserRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring malformed stored user");
                return None;
            }
        };
        let stated = record.stated_role();
        let user = record.into_user(slot_role);
        if user.is_none() {
            tracing::warn!(key, ?stated, expected = %slot_role, "ignoring stored user with conflicting role");
        }
        user
    }

    fn write_user(&self, key: &str, user: &User) -> Result<(), StorageError> {
        let json = serde_json::to_string(user)?;
        self.backend.set(key, &json)
    }
}
