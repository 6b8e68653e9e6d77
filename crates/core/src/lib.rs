//! BookHub Core - Shared domain types.
//!
//! This crate provides the types shared by every BookHub component:
//! - `client` - Session management, HTTP client and checkout flow
//! - `cli` - Command-line front end for the client
//! - `integration-tests` - Mock API and end-to-end tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure calculations - no I/O, no
//! storage access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, email, prices and rental fees, roles, users,
//!   cart items and rentals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
