//! BookHub client library.
//!
//! Session management, the authenticated HTTP client and the rental
//! checkout flow for the BookHub REST API.
//!
//! # Architecture
//!
//! - [`storage`] - durable key-value storage (`localStorage` semantics)
//! - [`credentials`] - tokens and user objects in storage
//! - [`session`] - the `Guest | User | Admin` session and route guards
//! - [`http`] - [`ApiClient`] with bearer attachment and 401 recovery
//! - [`auth`] - [`AuthContext`], the process-wide auth state
//! - [`cart`], [`checkout`], [`rentals`], [`recommendations`] - member
//!   features built on the client
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use bookhub_client::{ApiClient, AuthContext, ClientConfig, CredentialStore, FileStore, MemoryNavigator};
//!
//! let config = ClientConfig::from_env()?;
//! let store = Arc::new(FileStore::open(&config.storage_path)?);
//! let api = ApiClient::new(config, CredentialStore::new(store), Arc::new(MemoryNavigator::default()))?;
//!
//! let auth = AuthContext::new(api);
//! auth.initialize().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod navigation;
pub mod recommendations;
pub mod rentals;
pub mod session;
pub mod storage;

pub use auth::{AuthAction, AuthContext, AuthFailure, AuthState, ProfileUpdate, RegisterInput};
pub use cart::{Cart, CartError};
pub use checkout::{CheckoutError, CheckoutReceipt, CheckoutService};
pub use config::{AdminSessionPolicy, ClientConfig, ConfigError};
pub use credentials::CredentialStore;
pub use error::ApiError;
pub use http::{ApiClient, ApiRequest, with_unauthorized_retry};
pub use navigation::{MemoryNavigator, Navigator};
pub use recommendations::{AbortController, AbortSignal, Recommendation, RecommendationError, RecommendationService};
pub use rentals::RentalService;
pub use session::{Access, Credentials, GuardDecision, Session, guard};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
