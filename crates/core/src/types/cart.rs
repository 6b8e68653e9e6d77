//! Cart line items.

use serde::{Deserialize, Serialize};

use crate::{BookId, Price};

/// Errors from constructing or changing a [`CartItem`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartItemError {
    /// Quantity must be at least one.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    /// Price must not be negative.
    #[error("price cannot be negative")]
    NegativePrice,
}

/// A book in the cart.
///
/// Price and quantity are client-trusted; the server decides availability
/// when the cart is checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawCartItem")]
pub struct CartItem {
    /// Book being rented.
    pub book_id: BookId,
    /// Title shown to the user.
    pub title: String,
    /// Unit purchase price.
    pub price: Price,
    quantity: u32,
}

/// Wire form of a [`CartItem`], checked on the way in.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCartItem {
    book_id: BookId,
    title: String,
    price: Price,
    quantity: u32,
}

impl TryFrom<RawCartItem> for CartItem {
    type Error = CartItemError;

    fn try_from(raw: RawCartItem) -> Result<Self, Self::Error> {
        Self::new(raw.book_id, raw.title, raw.price, raw.quantity)
    }
}

impl CartItem {
    /// Create a cart item.
    ///
    /// # Errors
    ///
    /// Returns `CartItemError::ZeroQuantity` if `quantity` is 0 and
    /// `CartItemError::NegativePrice` for a negative price.
    pub fn new(
        book_id: BookId,
        title: impl Into<String>,
        price: Price,
        quantity: u32,
    ) -> Result<Self, CartItemError> {
        if quantity == 0 {
            return Err(CartItemError::ZeroQuantity);
        }
        if price.is_negative() {
            return Err(CartItemError::NegativePrice);
        }
        Ok(Self {
            book_id,
            title: title.into(),
            price,
            quantity,
        })
    }

    /// Number of copies.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Replace the quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartItemError::ZeroQuantity` if `quantity` is 0.
    pub const fn set_quantity(&mut self, quantity: u32) -> Result<(), CartItemError> {
        if quantity == 0 {
            return Err(CartItemError::ZeroQuantity);
        }
        self.quantity = quantity;
        Ok(())
    }

    /// Add copies, saturating at `u32::MAX`.
    pub const fn add_quantity(&mut self, extra: u32) {
        self.quantity = self.quantity.saturating_add(extra);
    }

    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price * self.quantity
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_zero_quantity() {
        let err = CartItem::new(BookId::new("A"), "Dune", Price::from_units(100), 0);
        assert_eq!(err, Err(CartItemError::ZeroQuantity));
    }

    #[test]
    fn test_new_rejects_negative_price() {
        let err = CartItem::new(BookId::new("A"), "Dune", Price::from_units(-5), 1);
        assert_eq!(err, Err(CartItemError::NegativePrice));
    }

    #[test]
    fn test_line_total() {
        let item = CartItem::new(BookId::new("A"), "Dune", Price::from_units(100), 2).unwrap();
        assert_eq!(item.line_total(), Price::from_units(200));
    }

    #[test]
    fn test_deserialize_checks_invariants() {
        let item: CartItem =
            serde_json::from_str(r#"{"bookId":"A","title":"Dune","price":"12.50","quantity":2}"#).unwrap();
        assert_eq!(item.quantity(), 2);

        let zero = serde_json::from_str::<CartItem>(r#"{"bookId":"A","title":"Dune","price":"1","quantity":0}"#);
        assert!(zero.unwrap_err().to_string().contains("quantity must be at least 1"));

        let negative =
            serde_json::from_str::<CartItem>(r#"{"bookId":"A","title":"Dune","price":"-1","quantity":1}"#);
        assert!(negative.unwrap_err().to_string().contains("price cannot be negative"));
    }

    #[test]
    fn test_set_quantity_keeps_invariant() {
        let mut item = CartItem::new(BookId::new("A"), "Dune", Price::from_units(100), 2).unwrap();
        assert_eq!(item.set_quantity(0), Err(CartItemError::ZeroQuantity));
        assert_eq!(item.quantity(), 2);
        item.set_quantity(5).unwrap();
        assert_eq!(item.quantity(), 5);
    }
}
