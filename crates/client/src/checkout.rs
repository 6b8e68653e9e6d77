//! Rental checkout.
//!
//! Submits the cart as one batch; the server decides per book whether a
//! copy is available. Partial success is success: the cart is cleared and
//! the receipt lists what could not be rented.

use bookhub_core::{BookId, Price, RENTAL_DURATION_DAYS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::cart::Cart;
use crate::error::ApiError;
use crate::http::ApiClient;
use crate::session::{Access, GuardDecision, guard};
use crate::storage::StorageError;

const BATCH_PATH: &str = "/rentals/batch";

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Only signed-in members can rent; `redirect` is where to send the
    /// client instead.
    #[error("sign in as a member to check out")]
    NotAllowed { redirect: &'static str },

    #[error("your cart is empty")]
    EmptyCart,

    /// The server answered `success: false`. The cart is kept.
    #[error("checkout rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The rentals were created but the emptied cart could not be saved.
    #[error("failed to save cart: {0}")]
    Storage(#[from] StorageError),
}

impl CheckoutError {
    /// Text to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Storage(_) => "Your rentals were created but the cart could not be updated.".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchItem<'a> {
    book_id: &'a BookId,
    quantity: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<'a> {
    items: Vec<BatchItem<'a>>,
    rental_duration: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    success: bool,
    #[serde(default)]
    rentals_created: u32,
    #[serde(default)]
    unavailable_books: Vec<BookId>,
    #[serde(default)]
    message: Option<String>,
}

/// Outcome of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub rentals_created: u32,
    pub unavailable_books: Vec<BookId>,
    /// Totals of the cart as submitted.
    pub purchase_total: Price,
    pub rental_fee: Price,
}

impl CheckoutReceipt {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.unavailable_books.is_empty()
    }

    /// Lines to show the user.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        let mut messages = vec![format!("{} book(s) rented", self.rentals_created)];
        if self.is_partial() {
            let ids = self
                .unavailable_books
                .iter()
                .map(BookId::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            messages.push(format!(
                "{} book(s) were unavailable: {ids}",
                self.unavailable_books.len()
            ));
        }
        messages
    }
}

/// Submits carts for rental.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    api: ApiClient,
}

impl CheckoutService {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Rent everything in `cart` for the standard rental period.
    ///
    /// On success the cart is emptied and saved, even when some books were
    /// unavailable.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotAllowed` unless a member is signed in,
    /// `CheckoutError::EmptyCart` for an empty cart,
    /// `CheckoutError::Rejected` when the server refuses the batch, and
    /// `CheckoutError::Api` for request failures.
    #[instrument(skip(self, cart), fields(lines = cart.items().len()))]
    pub async fn checkout(&self, cart: &mut Cart) -> Result<CheckoutReceipt, CheckoutError> {
        let session = self.api.credentials().active_session();
        if let GuardDecision::Redirect(redirect) = guard(&session, Access::Member) {
            return Err(CheckoutError::NotAllowed { redirect });
        }
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let purchase_total = cart.purchase_total();
        let rental_fee = cart.rental_fee();
        let request = BatchRequest {
            items: cart
                .items()
                .iter()
                .map(|item| BatchItem {
                    book_id: &item.book_id,
                    quantity: item.quantity(),
                })
                .collect(),
            rental_duration: RENTAL_DURATION_DAYS,
        };

        let response: BatchResponse = self.api.post(BATCH_PATH, &request).await?;

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "The rental could not be completed".to_string());
            tracing::warn!(%message, "checkout rejected");
            return Err(CheckoutError::Rejected(message));
        }

        let receipt = CheckoutReceipt {
            rentals_created: response.rentals_created,
            unavailable_books: response.unavailable_books,
            purchase_total,
            rental_fee,
        };

        tracing::info!(
            rentals_created = receipt.rentals_created,
            unavailable = receipt.unavailable_books.len(),
            "checkout completed"
        );

        cart.clear();
        cart.save(&**self.api.credentials().backend())?;

        Ok(receipt)
    }
}
