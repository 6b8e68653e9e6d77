//! Rental history and returns.

use bookhub_core::{Rental, RentalId};
use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::instrument;

use crate::error::ApiError;
use crate::http::{ApiClient, ApiRequest};

const HISTORY_PATH: &str = "/rentals/history";

/// The history endpoint answers with either a bare list or an envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryResponse {
    List(Vec<Rental>),
    Envelope { rentals: Vec<Rental> },
}

/// The return endpoint may echo the rental, wrapped or not.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReturnResponse {
    Envelope { rental: Rental },
    Rental(Rental),
    Other(IgnoredAny),
}

/// Reads and updates the signed-in member's rentals.
#[derive(Debug, Clone)]
pub struct RentalService {
    api: ApiClient,
}

impl RentalService {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// All rentals of the signed-in member, oldest first as the server
    /// returns them.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn history(&self) -> Result<Vec<Rental>, ApiError> {
        let response: HistoryResponse = self.api.get(HISTORY_PATH).await?;
        let rentals = match response {
            HistoryResponse::List(rentals) | HistoryResponse::Envelope { rentals } => rentals,
        };
        tracing::debug!(count = rentals.len(), "loaded rental history");
        Ok(rentals)
    }

    /// Return a rented book.
    ///
    /// Yields the updated rental when the server sends one back.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self), fields(rental_id = %id))]
    pub async fn return_rental(&self, id: &RentalId) -> Result<Option<Rental>, ApiError> {
        let path = return_path(id);
        let response: ReturnResponse = self.api.send(ApiRequest::post(path)).await?;

        tracing::info!("rental returned");
        Ok(match response {
            ReturnResponse::Envelope { rental } | ReturnResponse::Rental(rental) => Some(rental),
            ReturnResponse::Other(_) => None,
        })
    }
}

fn return_path(id: &RentalId) -> String {
    format!("/rentals/return/{}", urlencoding::encode(id.as_str()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RENTAL: &str = r#"{
        "_id": "r1",
        "bookId": "b1",
        "startDate": "2026-01-01T00:00:00Z",
        "dueDate": "2026-01-15T00:00:00Z",
        "isReturned": false
    }"#;

    #[test]
    fn test_return_path_is_encoded() {
        assert_eq!(return_path(&RentalId::new("abc123")), "/rentals/return/abc123");
        assert_eq!(return_path(&RentalId::new("a/b c")), "/rentals/return/a%2Fb%20c");
    }

    #[test]
    fn test_history_shapes() {
        let list: HistoryResponse = serde_json::from_str(&format!("[{RENTAL}]")).unwrap();
        assert!(matches!(list, HistoryResponse::List(ref r) if r.len() == 1));

        let wrapped: HistoryResponse =
            serde_json::from_str(&format!(r#"{{"rentals":[{RENTAL}]}}"#)).unwrap();
        assert!(matches!(wrapped, HistoryResponse::Envelope { ref rentals } if rentals.len() == 1));
    }

    #[test]
    fn test_return_shapes() {
        let wrapped: ReturnResponse =
            serde_json::from_str(&format!(r#"{{"message":"ok","rental":{RENTAL}}}"#)).unwrap();
        assert!(matches!(wrapped, ReturnResponse::Envelope { .. }));

        let bare: ReturnResponse = serde_json::from_str(RENTAL).unwrap();
        assert!(matches!(bare, ReturnResponse::Rental(_)));

        let other: ReturnResponse = serde_json::from_str(r#"{"message":"ok"}"#).unwrap();
        assert!(matches!(other, ReturnResponse::Other(_)));

        let empty: ReturnResponse = serde_json::from_str("null").unwrap();
        assert!(matches!(empty, ReturnResponse::Other(_)));
    }
}
