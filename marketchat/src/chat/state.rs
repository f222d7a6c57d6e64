//! Chat feature states and the small value types that travel with them.

use std::fmt;

use marketchat_proto::message::ChatMessage;
use marketchat_proto::model::ProductId;
use marketchat_proto::room::ChatRoom;

use crate::backend::BackendError;

/// How the open conversation was reached. Decides where "back" leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    /// Opened from a product listing; back leaves the chat feature.
    FromProduct,
    /// Picked from the room list; back returns to the list.
    FromRoomList,
}

/// Where the user ends up after [`super::ChatController::back`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    /// The room list is shown again.
    ShowRoomList,
    /// The chat feature is closed; the caller returns to the catalog.
    ExitChat,
}

/// The user action a [`ChatNotice`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    /// Loading the room list.
    LoadRooms,
    /// Opening a room for a product.
    OpenRoom,
    /// Sending a message.
    SendMessage,
    /// Fetching messages for the open room.
    RefreshMessages,
}

impl fmt::Display for ChatAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadRooms => write!(f, "load chat rooms"),
            Self::OpenRoom => write!(f, "open chat room"),
            Self::SendMessage => write!(f, "send message"),
            Self::RefreshMessages => write!(f, "refresh messages"),
        }
    }
}

/// A dismissable, user-visible report of a failed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatNotice {
    /// What the user was doing.
    pub action: ChatAction,
    /// Why it failed.
    pub error: BackendError,
}

impl fmt::Display for ChatNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not {}: {}", self.action, self.error)
    }
}

/// State of the chat feature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChatState {
    /// Chat is not open.
    #[default]
    Idle,
    /// The room list is being fetched.
    LoadingRoomList,
    /// The room list is shown.
    RoomList {
        /// Rooms, most recently active first.
        rooms: Vec<ChatRoom>,
    },
    /// A room is being created or looked up for a product.
    EnteringRoom {
        /// Product the room is for.
        product_id: ProductId,
    },
    /// A room is open.
    Conversation {
        /// The open room.
        room: ChatRoom,
        /// Last applied snapshot, oldest first.
        messages: Vec<ChatMessage>,
    },
    /// The room list could not be loaded.
    Error {
        /// What failed.
        context: ChatNotice,
    },
}

impl ChatState {
    /// Short state name for logs and error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoadingRoomList => "loading room list",
            Self::RoomList { .. } => "room list",
            Self::EnteringRoom { .. } => "entering room",
            Self::Conversation { .. } => "conversation",
            Self::Error { .. } => "error",
        }
    }

    /// The open room, if any.
    #[must_use]
    pub const fn room(&self) -> Option<&ChatRoom> {
        match self {
            Self::Conversation { room, .. } => Some(room),
            _ => None,
        }
    }

    /// Messages of the open room; empty outside a conversation.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        match self {
            Self::Conversation { messages, .. } => messages,
            _ => &[],
        }
    }

    /// Rooms shown in the room list; empty outside the list.
    #[must_use]
    pub fn rooms(&self) -> &[ChatRoom] {
        match self {
            Self::RoomList { rooms } => rooms,
            _ => &[],
        }
    }
}
