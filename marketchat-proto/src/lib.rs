//! Shared data model and wire types for the `MarketChat` HTTP API.

pub mod api;
pub mod message;
pub mod model;
pub mod product;
pub mod room;
