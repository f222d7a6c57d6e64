//! Backend abstraction for `MarketChat`.
//!
//! Defines the [`Marketplace`] trait the catalog and chat controllers talk
//! to. Implementations:
//! - [`http::HttpMarketplace`] - JSON over HTTP with bearer authentication
//!
//! Every call is made on behalf of the identity the implementation was
//! built with; viewer-relative fields (`is_wishlisted`, `counterpart_name`,
//! `last_message`) are projected for that identity by the backend.

pub mod http;
#[cfg(test)]
pub(crate) mod scripted;

use std::future::Future;

use marketchat_proto::api::ErrorCode;
use marketchat_proto::message::ChatMessage;
use marketchat_proto::model::{ProductId, RoomId};
use marketchat_proto::product::{Product, ProductDraft, ProductStatus};
use marketchat_proto::room::ChatRoom;

/// Errors surfaced by a [`Marketplace`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The room or product does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller is not allowed to do this (not a participant, or acting on
    /// their own listing).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request body was rejected.
    #[error("rejected: {0}")]
    Validation(String),

    /// The credential is missing, unknown or expired.
    #[error("not signed in or session expired")]
    Unauthorized,

    /// The backend could not be reached or answered with something
    /// unexpected.
    #[error("backend unreachable: {0}")]
    Transport(String),
}

impl BackendError {
    /// Builds the error for a structured error response.
    #[must_use]
    pub fn from_code(code: ErrorCode, message: String) -> Self {
        match code {
            ErrorCode::NotFound => Self::NotFound(message),
            ErrorCode::Forbidden => Self::Forbidden(message),
            ErrorCode::Validation => Self::Validation(message),
            ErrorCode::Unauthorized => Self::Unauthorized,
        }
    }

    /// Returns `true` for failures a background message refresh swallows.
    ///
    /// A failed poll leaves the displayed messages untouched; the next tick
    /// simply tries again.
    #[must_use]
    pub const fn is_silent_during_poll(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::NotFound(_) | Self::Forbidden(_)
        )
    }
}

/// The marketplace backend as seen by one signed-in user.
///
/// # Invariant
///
/// [`Marketplace::create_or_get_room`] is idempotent per (product, caller):
/// repeated and concurrent calls return the same room.
pub trait Marketplace: Send + Sync + 'static {
    /// All listings, newest first, with `is_wishlisted` projected for the
    /// caller.
    fn list_products(&self)
    -> impl Future<Output = Result<Vec<Product>, BackendError>> + Send;

    /// Listings owned by the caller.
    fn my_products(&self) -> impl Future<Output = Result<Vec<Product>, BackendError>> + Send;

    /// Listings the caller has wishlisted.
    fn my_wishlist(&self) -> impl Future<Output = Result<Vec<Product>, BackendError>> + Send;

    /// Creates a listing owned by the caller.
    fn create_product(
        &self,
        draft: &ProductDraft,
    ) -> impl Future<Output = Result<Product, BackendError>> + Send;

    /// Replaces the owner-editable fields of one of the caller's listings.
    fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> impl Future<Output = Result<Product, BackendError>> + Send;

    /// Marks one of the caller's listings on sale or sold out.
    fn set_product_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> impl Future<Output = Result<Product, BackendError>> + Send;

    /// Deletes one of the caller's listings.
    fn delete_product(&self, id: ProductId)
    -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Adds a product to the caller's wishlist. Idempotent.
    fn add_wishlist(&self, id: ProductId)
    -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Removes a product from the caller's wishlist. Idempotent.
    fn remove_wishlist(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Returns the caller's room for `product`, creating it on first use.
    fn create_or_get_room(
        &self,
        product: ProductId,
    ) -> impl Future<Output = Result<ChatRoom, BackendError>> + Send;

    /// Rooms the caller participates in, most recently active first.
    fn list_my_rooms(&self) -> impl Future<Output = Result<Vec<ChatRoom>, BackendError>> + Send;

    /// Full message history of a room, oldest first.
    fn list_messages(
        &self,
        room: RoomId,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, BackendError>> + Send;

    /// Appends a message to a room as the caller.
    fn send_message(
        &self,
        room: RoomId,
        content: &str,
    ) -> impl Future<Output = Result<ChatMessage, BackendError>> + Send;
}
