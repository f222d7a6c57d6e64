//! Chat room registry and per-room message logs.
//!
//! Rooms are indexed by `(product, buyer)` so that create-or-get is
//! idempotent: asking twice for the same pair returns the same room. Message
//! logs are append-only and their timestamps never decrease within a room.

use std::collections::{BTreeMap, HashMap};

use marketchat_proto::message::{ChatMessage, validate_content};
use marketchat_proto::model::{MessageId, ProductId, RoomId, Timestamp, User, UserId};
use marketchat_proto::room::ChatRoom;
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::store::StoredProduct;

/// A room together with its message log.
#[derive(Debug, Clone)]
struct RoomEntry {
    id: RoomId,
    product_id: ProductId,
    product_name: String,
    product_image_url: Option<String>,
    buyer: User,
    seller: User,
    created_at: Timestamp,
    /// Registry clock value of the last create or append.
    activity: u64,
    messages: Vec<ChatMessage>,
}

impl RoomEntry {
    fn is_participant(&self, user: UserId) -> bool {
        self.buyer.id == user || self.seller.id == user
    }

    /// Projects the room for `viewer`: counterpart name and last-message preview.
    fn project(&self, viewer: UserId) -> ChatRoom {
        let counterpart = if viewer == self.buyer.id {
            &self.seller
        } else {
            &self.buyer
        };
        ChatRoom {
            id: self.id,
            product_id: self.product_id,
            product_name: self.product_name.clone(),
            product_image_url: self.product_image_url.clone(),
            buyer_id: self.buyer.id,
            seller_id: self.seller.id,
            counterpart_name: counterpart.display_name.clone(),
            last_message: self.messages.last().map(|m| m.content.clone()),
            created_at: self.created_at,
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    clock: u64,
    next_room_id: u64,
    next_message_id: u64,
    rooms: BTreeMap<RoomId, RoomEntry>,
    by_pair: HashMap<(ProductId, UserId), RoomId>,
}

fn participant_room_mut(
    rooms: &mut BTreeMap<RoomId, RoomEntry>,
    room_id: RoomId,
    user: UserId,
) -> Result<&mut RoomEntry, ApiError> {
    let room = rooms.get_mut(&room_id).ok_or(ApiError::NotFound("room"))?;
    if !room.is_participant(user) {
        return Err(ApiError::Forbidden(
            "not a participant of this room".to_string(),
        ));
    }
    Ok(room)
}

/// Outcome of [`RoomRegistry::create_or_get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedRoom {
    /// The room, projected for the buyer.
    pub room: ChatRoom,
    /// Whether this call created the room.
    pub created: bool,
}

/// Thread-safe registry of chat rooms.
#[derive(Default)]
pub struct RoomRegistry {
    inner: RwLock<RegistryInner>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the room for `(product, buyer)`, creating it if absent.
    ///
    /// The lookup and insert happen under one write lock, so concurrent
    /// duplicate requests for the same pair observe a single room.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] when the buyer owns the product.
    pub async fn create_or_get(
        &self,
        product: &StoredProduct,
        buyer: &User,
    ) -> Result<OpenedRoom, ApiError> {
        if product.owner.id == buyer.id {
            return Err(ApiError::Forbidden(
                "cannot open a chat on your own listing".to_string(),
            ));
        }

        let mut inner = self.inner.write().await;
        if let Some(room_id) = inner.by_pair.get(&(product.id, buyer.id)).copied()
            && let Some(entry) = inner.rooms.get(&room_id)
        {
            tracing::debug!(room_id = %room_id, product_id = %product.id, "existing room returned");
            return Ok(OpenedRoom {
                room: entry.project(buyer.id),
                created: false,
            });
        }

        inner.next_room_id += 1;
        inner.clock += 1;
        let id = RoomId::new(inner.next_room_id);
        let entry = RoomEntry {
            id,
            product_id: product.id,
            product_name: product.draft.name.clone(),
            product_image_url: product.draft.image_url.clone(),
            buyer: buyer.clone(),
            seller: product.owner.clone(),
            created_at: Timestamp::now(),
            activity: inner.clock,
            messages: Vec::new(),
        };
        let room = entry.project(buyer.id);
        inner.by_pair.insert((product.id, buyer.id), id);
        inner.rooms.insert(id, entry);
        drop(inner);

        tracing::info!(room_id = %id, product_id = %product.id, buyer = %buyer.id, "room created");
        Ok(OpenedRoom {
            room,
            created: true,
        })
    }

    /// Lists every room `user` participates in, most recently active first.
    pub async fn list_for(&self, user: UserId) -> Vec<ChatRoom> {
        let inner = self.inner.read().await;
        let mut rooms: Vec<&RoomEntry> = inner
            .rooms
            .values()
            .filter(|r| r.is_participant(user))
            .collect();
        rooms.sort_by(|a, b| b.activity.cmp(&a.activity));
        rooms.into_iter().map(|r| r.project(user)).collect()
    }

    /// Returns the full message log of a room in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] or [`ApiError::Forbidden`] for
    /// non-participants.
    pub async fn messages(
        &self,
        room_id: RoomId,
        user: UserId,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let inner = self.inner.read().await;
        let room = inner.rooms.get(&room_id).ok_or(ApiError::NotFound("room"))?;
        if !room.is_participant(user) {
            return Err(ApiError::Forbidden(
                "not a participant of this room".to_string(),
            ));
        }
        Ok(room.messages.clone())
    }

    /// Appends a message from `sender` to a room.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for empty or oversized content,
    /// [`ApiError::NotFound`], or [`ApiError::Forbidden`] for non-participants.
    pub async fn append(
        &self,
        room_id: RoomId,
        sender: &User,
        content: &str,
    ) -> Result<ChatMessage, ApiError> {
        let content = validate_content(content).map_err(|e| ApiError::Validation(e.to_string()))?;

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        // Ids and the clock only advance once the send is accepted.
        let room = participant_room_mut(&mut inner.rooms, room_id, sender.id)?;
        inner.next_message_id += 1;
        inner.clock += 1;
        let id = MessageId::new(inner.next_message_id);
        room.activity = inner.clock;

        let now = Timestamp::now();
        let created_at = room
            .messages
            .last()
            .map_or(now, |prev| now.max(prev.created_at));
        let message = ChatMessage {
            id,
            room_id,
            sender_id: sender.id,
            sender_name: sender.display_name.clone(),
            content: content.to_string(),
            created_at,
        };
        room.messages.push(message.clone());
        drop(guard);

        tracing::debug!(room_id = %room_id, message_id = %id, "message appended");
        Ok(message)
    }

    /// Number of rooms in the registry.
    pub async fn len(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// Returns true if no room has been opened yet.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.rooms.is_empty()
    }
}
