//! HTTP surface shared by the client adapter and the reference backend:
//! route paths and the JSON error body.

use serde::{Deserialize, Serialize};

use crate::model::{ProductId, RoomId};

/// Health probe.
pub const HEALTH: &str = "/api/health";
/// Catalog listing and creation.
pub const PRODUCTS: &str = "/api/products";
/// Listings owned by the caller.
pub const MY_PRODUCTS: &str = "/api/products/mine";
/// The caller's wishlist.
pub const WISHLIST: &str = "/api/wishlist";
/// Room list and create-or-get.
pub const ROOMS: &str = "/api/chat/rooms";

/// Path of a single listing.
#[must_use]
pub fn product_path(id: ProductId) -> String {
    format!("{PRODUCTS}/{id}")
}

/// Path of a listing's status resource.
#[must_use]
pub fn product_status_path(id: ProductId) -> String {
    format!("{PRODUCTS}/{id}/status")
}

/// Path of a wishlist mark.
#[must_use]
pub fn wishlist_path(id: ProductId) -> String {
    format!("{WISHLIST}/{id}")
}

/// Path of a room's message collection.
#[must_use]
pub fn messages_path(id: RoomId) -> String {
    format!("{ROOMS}/{id}/messages")
}

/// Machine-readable error category carried in every error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Room or product missing.
    NotFound,
    /// Caller is not a participant, or is acting on their own listing.
    Forbidden,
    /// Request body rejected.
    Validation,
    /// Credential missing, unknown or expired.
    Unauthorized,
}

/// JSON body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error category.
    pub code: ErrorCode,
    /// Human-readable description.
    pub error: String,
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Always `"healthy"` when the backend answers.
    pub status: String,
}
