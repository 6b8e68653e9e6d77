//! Command implementations.
//!
//! Every command runs against an [`App`]: the file-backed store, the API
//! client and an initialized auth context.

pub mod auth;
pub mod cart;
pub mod rentals;

use std::sync::Arc;

use bookhub_client::{
    ApiClient, ApiError, AuthContext, AuthFailure, CartError, CheckoutError, ClientConfig, ConfigError,
    CredentialStore, FileStore, MemoryNavigator, Navigator, RecommendationError, StorageError,
};
use thiserror::Error;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Recommendations(#[from] RecommendationError),
}

impl CommandError {
    /// Text to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) | Self::Recommendations(RecommendationError::Api(e)) => e.user_message(),
            Self::Checkout(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Wiring shared by all commands.
pub struct App {
    pub store: Arc<FileStore>,
    pub navigator: Arc<MemoryNavigator>,
    pub auth: AuthContext,
}

impl App {
    /// Open storage, build the client and restore the session.
    pub async fn start(config: ClientConfig) -> Result<Self, CommandError> {
        let store = Arc::new(FileStore::open(&config.storage_path)?);
        let navigator = Arc::new(MemoryNavigator::default());
        let api = ApiClient::new(config, CredentialStore::new(store.clone()), navigator.clone())?;

        let auth = AuthContext::new(api);
        auth.initialize().await;

        Ok(Self {
            store,
            navigator,
            auth,
        })
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        self.auth.api()
    }

    /// Tell the user where the client would have navigated, e.g. after the
    /// session ended.
    pub fn report_redirects(&self) {
        for path in self.navigator.redirects() {
            let hint = match path.as_str() {
                "/login" => "run `bookhub login` to sign in again",
                "/admin/login" => "run `bookhub admin-login` to sign in again",
                _ => continue,
            };
            tracing::warn!(redirect = %path, "{hint}");
        }
        tracing::debug!(path = %self.navigator.current_path(), "final location");
    }
}
