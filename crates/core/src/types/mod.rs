//! Core types for BookHub.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod price;
pub mod rental;
pub mod status;
pub mod user;

pub use cart::{CartItem, CartItemError};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, RENTAL_DURATION_DAYS, RENTAL_FEE_RATE, rental_fee};
pub use rental::Rental;
pub use status::*;
pub use user::User;
