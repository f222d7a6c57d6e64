//! Chat message records and send-side validation.

use serde::{Deserialize, Serialize};

use crate::model::{MessageId, RoomId, Timestamp, UserId};

/// Maximum allowed message content size in bytes (4 KB).
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024;

/// A message in a chat room. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Author's display name at send time.
    pub sender_name: String,
    /// Text content, already trimmed.
    pub content: String,
    /// Creation time; non-decreasing within a room.
    pub created_at: Timestamp,
}

impl ChatMessage {
    /// Display ordering key: creation time, then id.
    #[must_use]
    pub const fn ordering_key(&self) -> (Timestamp, MessageId) {
        (self.created_at, self.id)
    }
}

/// Body of `POST /api/chat/rooms/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Text to send.
    pub content: String,
}

/// Error returned when message content fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Content is empty or whitespace only.
    #[error("message content is empty")]
    Empty,
    /// Content exceeds the maximum allowed size.
    #[error("message too large ({size} bytes, max {max} bytes)")]
    TooLarge {
        /// Actual size of the trimmed content in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },
}

/// Validates message content for sending and returns the trimmed text.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] if nothing remains after trimming, or
/// [`ValidationError::TooLarge`] if the trimmed text exceeds
/// [`MAX_MESSAGE_SIZE`].
pub fn validate_content(content: &str) -> Result<&str, ValidationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    if trimmed.len() > MAX_MESSAGE_SIZE {
        return Err(ValidationError::TooLarge {
            size: trimmed.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(trimmed)
}
