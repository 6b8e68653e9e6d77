//! Book recommendations.
//!
//! Recommendations are fetched once and cached under
//! [`keys::CACHED_RECOMMENDATIONS`] for the configured TTL. A fetch can be
//! cancelled through an [`AbortSignal`], e.g. when the page that asked for
//! it goes away.

use std::time::Duration;

use bookhub_core::{BookId, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::instrument;

use crate::error::ApiError;
use crate::http::ApiClient;
use crate::storage::{KeyValueStore, StorageError, keys};

const RECOMMENDATIONS_PATH: &str = "/books/recommendations";

/// Errors from fetching recommendations.
#[derive(Debug, Error)]
pub enum RecommendationError {
    /// The fetch was cancelled before it finished.
    #[error("recommendation fetch aborted")]
    Aborted,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A recommended book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(alias = "_id")]
    pub id: BookId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecommendationsResponse {
    List(Vec<Recommendation>),
    Envelope { recommendations: Vec<Recommendation> },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedRecommendations {
    fetched_at: DateTime<Utc>,
    items: Vec<Recommendation>,
}

// =============================================================================
// Cancellation
// =============================================================================

/// Owner side of a cancellation. Dropping it aborts every signal it handed
/// out.
#[derive(Debug)]
pub struct AbortController {
    tx: watch::Sender<bool>,
}

/// Observer side of a cancellation.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortController {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn abort(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    /// Whether the controller aborted or was dropped.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once aborted.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        // An error means the controller is gone, which counts as aborted.
        let _ = rx.wait_for(|aborted| *aborted).await;
    }
}

// =============================================================================
// Service
// =============================================================================

/// Fetches and caches recommendations.
#[derive(Debug, Clone)]
pub struct RecommendationService {
    api: ApiClient,
    ttl: Duration,
}

impl RecommendationService {
    /// Create a service using the configured cache TTL.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let ttl = api.config().recommendations_ttl;
        Self { api, ttl }
    }

    /// Recommendations for the current user, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `RecommendationError::Aborted` if `signal` fires first, or
    /// `RecommendationError::Api` if the request fails.
    #[instrument(skip(self, signal))]
    pub async fn fetch(&self, signal: &AbortSignal) -> Result<Vec<Recommendation>, RecommendationError> {
        if signal.is_aborted() {
            return Err(RecommendationError::Aborted);
        }
        if let Some(items) = self.cached(Utc::now()) {
            tracing::debug!(count = items.len(), "serving cached recommendations");
            return Ok(items);
        }

        let response: RecommendationsResponse = tokio::select! {
            biased;
            () = signal.aborted() => {
                tracing::info!("recommendation fetch aborted");
                return Err(RecommendationError::Aborted);
            }
            response = self.api.get(RECOMMENDATIONS_PATH) => response?,
        };

        let items = match response {
            RecommendationsResponse::List(items) | RecommendationsResponse::Envelope { recommendations: items } => items,
        };
        self.store(&items, Utc::now());
        Ok(items)
    }

    /// Cached recommendations younger than the TTL at `now`.
    #[must_use]
    pub fn cached(&self, now: DateTime<Utc>) -> Option<Vec<Recommendation>> {
        let raw = self.api.credentials().backend().get(keys::CACHED_RECOMMENDATIONS)?;
        let cache: CachedRecommendations = match serde_json::from_str(&raw) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed recommendations cache");
                return None;
            }
        };

        // A timestamp in the future fails `to_std` and counts as stale.
        let fresh = now
            .signed_duration_since(cache.fetched_at)
            .to_std()
            .is_ok_and(|age| age < self.ttl);
        fresh.then_some(cache.items)
    }

    /// Drop the cache so the next fetch hits the server.
    pub fn invalidate(&self) {
        if let Err(e) = self.api.credentials().backend().remove(keys::CACHED_RECOMMENDATIONS) {
            tracing::warn!(error = %e, "failed to drop recommendations cache");
        }
    }

    fn store(&self, items: &[Recommendation], fetched_at: DateTime<Utc>) {
        let cache = CachedRecommendations {
            fetched_at,
            items: items.to_vec(),
        };
        let written = serde_json::to_string(&cache)
            .map_err(StorageError::from)
            .and_then(|json| {
                self.api
                    .credentials()
                    .backend()
                    .set(keys::CACHED_RECOMMENDATIONS, &json)
            });
        if let Err(e) = written {
            tracing::warn!(error = %e, "failed to cache recommendations");
        }
    }
}
