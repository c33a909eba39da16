//! Maple Market Core - Shared domain library.
//!
//! Common types and the cart model used by the storefront:
//! - [`types`] - Newtype IDs, the catalog product record, email addresses
//! - [`cart`] - The pure cart state machine: cookie codec, catalog join,
//!   quantity mutations, and checkout totals
//!
//! # Architecture
//!
//! This crate contains only types and pure functions - no I/O, no HTTP
//! clients, no cookie handling. The storefront crate layers transport and
//! persistence on top.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{CartEntry, Totals, TAX_RATE};
pub use types::*;
