//! Shopping cart.
//!
//! The cart is client-owned: titles, prices and quantities are whatever the
//! user added, and the server only weighs in at checkout. It can be
//! persisted under [`keys::CART`], which survives logout.

use bookhub_core::{BookId, CartItem, CartItemError, Price, rental_fee};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{KeyValueStore, StorageError, keys};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Item(#[from] CartItemError),

    #[error("book {0} is not in the cart")]
    NotInCart(BookId),

    #[error("failed to save cart: {0}")]
    Storage(#[from] StorageError),
}

/// Books the user intends to rent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of copies across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |n, item| n.saturating_add(item.quantity()))
    }

    #[must_use]
    pub fn get(&self, book_id: &BookId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.book_id == book_id)
    }

    /// Add `item`. A book already in the cart gets the extra copies; its
    /// title and price stay as first added.
    pub fn add(&mut self, item: CartItem) {
        match self.items.iter_mut().find(|line| line.book_id == item.book_id) {
            Some(line) => line.add_quantity(item.quantity()),
            None => self.items.push(item),
        }
    }

    /// Set the number of copies of a book.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` for an unknown book and
    /// `CartError::Item` for a zero quantity.
    pub fn set_quantity(&mut self, book_id: &BookId, quantity: u32) -> Result<(), CartError> {
        let line = self
            .items
            .iter_mut()
            .find(|line| &line.book_id == book_id)
            .ok_or_else(|| CartError::NotInCart(book_id.clone()))?;
        line.set_quantity(quantity)?;
        Ok(())
    }

    /// Remove a book, returning its line.
    pub fn remove(&mut self, book_id: &BookId) -> Option<CartItem> {
        let index = self.items.iter().position(|line| &line.book_id == book_id)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of price times quantity.
    #[must_use]
    pub fn purchase_total(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Rental fee for the whole cart.
    #[must_use]
    pub fn rental_fee(&self) -> Price {
        rental_fee(self.purchase_total())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Read the persisted cart. Missing or malformed data yields an empty
    /// cart; invalid lines are dropped.
    #[must_use]
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let Some(raw) = store.get(keys::CART) else {
            return Self::default();
        };

        let lines: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed stored cart");
                return Self::default();
            }
        };

        // Each line is checked on deserialize; a bad one is dropped alone.
        let before = lines.len();
        let items: Vec<CartItem> = lines
            .into_iter()
            .filter_map(|line| serde_json::from_value(line).ok())
            .collect();
        if items.len() != before {
            tracing::warn!(dropped = before - items.len(), "dropped invalid cart lines");
        }
        Self { items }
    }

    /// Persist the cart. An empty cart removes the key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store rejects the write.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        if self.is_empty() {
            return store.remove(keys::CART);
        }
        store.set(keys::CART, &serde_json::to_string(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn item(id: &str, price: i64, quantity: u32) -> CartItem {
        CartItem::new(BookId::new(id), format!("Book {id}"), Price::from_units(price), quantity).unwrap()
    }

    #[test]
    fn test_totals() {
        let mut cart = Cart::new();
        cart.add(item("A", 100, 2));
        cart.add(item("B", 50, 1));

        assert_eq!(cart.purchase_total(), Price::from_units(250));
        assert_eq!(cart.rental_fee(), Price::from_units(75));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_add_merges_same_book() {
        let mut cart = Cart::new();
        cart.add(item("A", 100, 1));
        cart.add(item("A", 999, 2));

        assert_eq!(cart.items().len(), 1);
        let line = cart.get(&BookId::new("A")).unwrap();
        assert_eq!(line.quantity(), 3);
        assert_eq!(line.price, Price::from_units(100));
    }

    #[test]
    fn test_set_quantity() {
        let mut cart = Cart::new();
        cart.add(item("A", 10, 1));

        cart.set_quantity(&BookId::new("A"), 4).unwrap();
        assert_eq!(cart.item_count(), 4);

        assert!(matches!(
            cart.set_quantity(&BookId::new("A"), 0),
            Err(CartError::Item(CartItemError::ZeroQuantity))
        ));
        assert!(matches!(
            cart.set_quantity(&BookId::new("Z"), 1),
            Err(CartError::NotInCart(_))
        ));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add(item("A", 10, 1));
        cart.add(item("B", 10, 1));

        assert!(cart.remove(&BookId::new("A")).is_some());
        assert!(cart.remove(&BookId::new("A")).is_none());
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.purchase_total(), Price::ZERO);
    }

    #[test]
    fn test_persistence() {
        let store = MemoryStore::new();
        let mut cart = Cart::new();
        cart.add(item("A", 100, 2));
        cart.save(&store).unwrap();

        assert_eq!(Cart::load(&store), cart);

        Cart::new().save(&store).unwrap();
        assert!(!store.contains(keys::CART));
    }

    #[test]
    fn test_load_tolerates_bad_data() {
        let store = MemoryStore::with_entries([(keys::CART, "{oops")]);
        assert!(Cart::load(&store).is_empty());

        let store = MemoryStore::with_entries([(
            keys::CART,
            r#"[{"bookId":"A","title":"A","price":"10","quantity":0},{"bookId":"B","title":"B","price":"5","quantity":1}]"#,
        )]);
        let cart = Cart::load(&store);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items().first().unwrap().book_id, BookId::new("B"));
    }
}
