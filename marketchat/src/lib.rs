//! `MarketChat`: marketplace client core.
//!
//! The crate is organised around three collaborating parts:
//! - [`catalog`]: listings with viewer-relative ownership and wishlist state,
//!   and the wishlist toggle.
//! - [`chat`]: the chat controller, which opens rooms idempotently and keeps
//!   the open conversation in sync by polling snapshots.
//! - [`backend`]: the [`backend::Marketplace`] contract both depend on, with
//!   an HTTP implementation.

pub mod backend;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod identity;
