//! Durable key-value storage.
//!
//! The client keeps credentials, the cart and cached recommendations in a
//! string-to-string store with the semantics of browser `localStorage`:
//! reads never fail (a missing or unreadable value is simply absent) and
//! writes report errors.
//!
//! - [`MemoryStore`] - process-local, used by tests and ephemeral sessions
//! - [`FileStore`] - JSON file on disk, written through on every change

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Errors that can occur when writing to a store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding the stored entries failed.
    #[error("storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// String key-value storage shared by the client components.
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value could not be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the removal could not be persisted.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage keys used by the client.
pub mod keys {
    /// Regular session access token.
    pub const TOKEN: &str = "token";

    /// Legacy regular session access token, still honored on read.
    pub const AUTH_TOKEN: &str = "authToken";

    /// Admin session access token.
    pub const ADMIN_TOKEN: &str = "adminToken";

    /// Refresh token of the regular session.
    pub const REFRESH_TOKEN: &str = "refreshToken";

    /// Regular session user (JSON).
    pub const USER: &str = "user";

    /// Admin session user (JSON).
    pub const ADMIN_USER: &str = "adminUser";

    /// Cached book recommendations (JSON).
    pub const CACHED_RECOMMENDATIONS: &str = "cachedRecommendations";

    /// Persisted cart (JSON). Not a credential key: survives logout.
    pub const CART: &str = "cart";

    /// Keys holding session credentials or user data.
    pub const SESSION_KEYS: [&str; 6] = [TOKEN, AUTH_TOKEN, ADMIN_TOKEN, REFRESH_TOKEN, USER, ADMIN_USER];

    /// Every key removed when a session is cleared.
    pub const CLEARED_ON_LOGOUT: [&str; 7] = [
        TOKEN,
        AUTH_TOKEN,
        ADMIN_TOKEN,
        REFRESH_TOKEN,
        USER,
        ADMIN_USER,
        CACHED_RECOMMENDATIONS,
    ];
}
