//! `MarketChat` reference backend library.
//!
//! Exposes the HTTP server for use in tests and embedding. The server keeps
//! products, wishlist marks, chat rooms and messages in memory and resolves
//! callers from pre-provisioned bearer tokens.

pub mod accounts;
pub mod config;
pub mod error;
pub mod rooms;
pub mod server;
pub mod store;
