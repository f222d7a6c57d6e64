//! Chat room records and the create-or-get request body.

use serde::{Deserialize, Serialize};

use crate::model::{ProductId, RoomId, Timestamp, UserId};

/// A one-to-one conversation about a single product.
///
/// Rooms are unique per `(product_id, buyer_id)`. `counterpart_name` and
/// `last_message` are projections relative to the requesting viewer and are
/// point-in-time snapshots; they are not kept live on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    /// Room identifier.
    pub id: RoomId,
    /// Product the conversation is about.
    pub product_id: ProductId,
    /// Product title at the time of the snapshot.
    pub product_name: String,
    /// Product image, if any.
    #[serde(default)]
    pub product_image_url: Option<String>,
    /// The non-owner participant.
    pub buyer_id: UserId,
    /// The product owner.
    pub seller_id: UserId,
    /// Display name of whichever participant is not the viewer.
    pub counterpart_name: String,
    /// Preview of the most recent message, if any.
    #[serde(default)]
    pub last_message: Option<String>,
    /// When the room was first opened.
    pub created_at: Timestamp,
}

/// Body of `POST /api/chat/rooms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    /// Product to open a conversation about.
    pub product_id: ProductId,
}
