//! Chat controller: room list, room entry, and the open conversation.
//!
//! User actions are synchronous methods that change [`ChatState`] at once
//! and start backend calls in the background. Each call reports back as a
//! [`ChatEvent`] on an internal channel; the owner drives the controller by
//! awaiting [`ChatController::pump`] (or [`ChatController::next_event`] plus
//! [`ChatController::handle_event`]) on the same task that issues actions.
//!
//! # State machine
//!
//! ```text
//! Idle ──open──▶ LoadingRoomList ──ok──▶ RoomList ──select──▶ Conversation
//!   │                   └──err──▶ Error ──open──┘               ▲   │
//!   └──start_chat──▶ EnteringRoom ──ok─────────────────────────┘   │
//!                        └──err──▶ (origin)            back ◀──────┘
//! ```

pub mod refresh;
pub mod state;
pub mod sync;

use std::future::Future;
use std::sync::Arc;

use marketchat_proto::message::{ChatMessage, ValidationError, validate_content};
use marketchat_proto::model::{ProductId, RoomId};
use marketchat_proto::room::ChatRoom;
use tokio::sync::mpsc;

pub use refresh::{IntervalRefresh, ManualRefresh, RefreshGuard, RefreshSource};
pub use state::{BackOutcome, ChatAction, ChatNotice, ChatState, EntryMode};
pub use sync::{FetchTicket, SnapshotSync};

use crate::backend::{BackendError, Marketplace};
use crate::identity::IdentityContext;

/// Completion of a background call, or a refresh trigger.
#[derive(Debug)]
pub enum ChatEvent {
    /// `list_my_rooms` finished.
    RoomsLoaded {
        /// Load request number; only the newest is applied.
        request: u64,
        /// Rooms or the failure.
        result: Result<Vec<ChatRoom>, BackendError>,
    },
    /// `create_or_get_room` finished.
    RoomOpened {
        /// Entry request number; only the pending entry's is applied.
        request: u64,
        /// Product the room was requested for.
        product_id: ProductId,
        /// The room or the failure.
        result: Result<ChatRoom, BackendError>,
    },
    /// `list_messages` finished.
    MessagesFetched {
        /// Ticket issued when the fetch started.
        ticket: FetchTicket,
        /// Full history snapshot or the failure.
        result: Result<Vec<ChatMessage>, BackendError>,
    },
    /// `send_message` finished.
    MessageSent {
        /// Send request number; only the pending send's is applied.
        request: u64,
        /// Room the message was sent to.
        room_id: RoomId,
        /// Trimmed content that was sent.
        content: String,
        /// Stored message or the failure.
        result: Result<ChatMessage, BackendError>,
    },
    /// The active refresh source asks for a re-fetch.
    RefreshDue {
        /// Room the source was started for.
        room_id: RoomId,
    },
}

/// Whether handling an event changed anything the user can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// State, input or notice changed; re-render.
    Updated,
    /// Nothing visible changed (stale result, swallowed poll error, tick).
    Unchanged,
}

/// Errors returned synchronously from user actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// A room is already being opened.
    #[error("a chat room is already being opened")]
    Busy,

    /// The action is not available in the current state.
    #[error("cannot {action} while in {state}")]
    InvalidState {
        /// What was attempted.
        action: &'static str,
        /// State name at the time.
        state: &'static str,
    },

    /// The room is not in the displayed room list.
    #[error("room {0} is not in the room list")]
    UnknownRoom(RoomId),

    /// A previous message has not been acknowledged yet.
    #[error("a message is already being sent")]
    SendInProgress,

    /// The message content was rejected before sending.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Room entry in progress.
#[derive(Debug)]
struct PendingEntry {
    request: u64,
    mode: EntryMode,
    return_to: ChatState,
}

/// Message send awaiting acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingSend {
    request: u64,
    room_id: RoomId,
}

/// Drives the chat feature for one signed-in user.
///
/// Dropping the controller stops any running refresh source.
pub struct ChatController<M, R = IntervalRefresh> {
    backend: Arc<M>,
    identity: Arc<IdentityContext>,
    refresh: R,
    state: ChatState,
    entry: Option<EntryMode>,
    entering: Option<PendingEntry>,
    known_rooms: Vec<ChatRoom>,
    requests: u64,
    rooms_request: u64,
    sync: SnapshotSync,
    guard: Option<RefreshGuard>,
    input: String,
    pending_send: Option<PendingSend>,
    notice: Option<ChatNotice>,
    events_tx: mpsc::UnboundedSender<ChatEvent>,
    events_rx: mpsc::UnboundedReceiver<ChatEvent>,
}

impl<M: Marketplace, R: RefreshSource> ChatController<M, R> {
    /// Creates an idle controller.
    pub fn new(backend: Arc<M>, identity: Arc<IdentityContext>, refresh: R) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            identity,
            refresh,
            state: ChatState::Idle,
            entry: None,
            entering: None,
            known_rooms: Vec::new(),
            requests: 0,
            rooms_request: 0,
            sync: SnapshotSync::new(),
            guard: None,
            input: String::new(),
            pending_send: None,
            notice: None,
            events_tx,
            events_rx,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &ChatState {
        &self.state
    }

    /// The identity the controller acts as.
    #[must_use]
    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    /// How the open conversation was entered, if one is open.
    #[must_use]
    pub const fn entry_mode(&self) -> Option<EntryMode> {
        self.entry
    }

    /// Most recently loaded room list, kept while a conversation is open.
    #[must_use]
    pub fn known_rooms(&self) -> &[ChatRoom] {
        &self.known_rooms
    }

    /// Pending message text.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replaces the pending message text.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// The last failure to report, if not dismissed.
    #[must_use]
    pub const fn notice(&self) -> Option<&ChatNotice> {
        self.notice.as_ref()
    }

    /// Clears the current notice.
    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Returns `true` while a room is being opened; start-chat controls
    /// should be disabled.
    #[must_use]
    pub const fn is_entering(&self) -> bool {
        matches!(self.state, ChatState::EnteringRoom { .. })
    }

    /// Returns `true` while a sent message awaits acknowledgment.
    #[must_use]
    pub const fn is_sending(&self) -> bool {
        self.pending_send.is_some()
    }

    /// Returns `true` if `message` was written by the signed-in user.
    #[must_use]
    pub fn is_own(&self, message: &ChatMessage) -> bool {
        self.identity.is_self(message.sender_id)
    }

    /// Enters the chat feature without a target product and loads the room
    /// list. Also retries after a failed load.
    ///
    /// # Errors
    ///
    /// [`ChatError::InvalidState`] unless idle or in the error state.
    pub fn open(&mut self) -> Result<(), ChatError> {
        if !matches!(self.state, ChatState::Idle | ChatState::Error { .. }) {
            return Err(self.invalid("open the room list"));
        }
        self.transition(ChatState::LoadingRoomList);
        self.load_rooms();
        Ok(())
    }

    /// Opens the room for `product_id`, creating it if this is the first
    /// conversation about the product.
    ///
    /// # Errors
    ///
    /// [`ChatError::Busy`] while a previous call is in flight, or
    /// [`ChatError::InvalidState`] unless idle or showing the room list.
    pub fn start_chat(&mut self, product_id: ProductId, mode: EntryMode) -> Result<(), ChatError> {
        match self.state {
            ChatState::EnteringRoom { .. } => return Err(ChatError::Busy),
            ChatState::Idle | ChatState::RoomList { .. } => {}
            _ => return Err(self.invalid("start a chat")),
        }

        let request = self.next_request();
        self.entering = Some(PendingEntry {
            request,
            mode,
            return_to: self.state.clone(),
        });
        self.transition(ChatState::EnteringRoom { product_id });

        let backend = Arc::clone(&self.backend);
        self.spawn_call(async move {
            ChatEvent::RoomOpened {
                request,
                product_id,
                result: backend.create_or_get_room(product_id).await,
            }
        });
        Ok(())
    }

    /// Opens a room from the displayed room list.
    ///
    /// # Errors
    ///
    /// [`ChatError::InvalidState`] unless showing the room list, or
    /// [`ChatError::UnknownRoom`] if `room_id` is not listed.
    pub fn select_room(&mut self, room_id: RoomId) -> Result<(), ChatError> {
        let ChatState::RoomList { rooms } = &self.state else {
            return Err(self.invalid("select a room"));
        };
        let room = rooms
            .iter()
            .find(|r| r.id == room_id)
            .cloned()
            .ok_or(ChatError::UnknownRoom(room_id))?;
        self.enter_conversation(room, EntryMode::FromRoomList);
        Ok(())
    }

    /// Leaves the current view.
    ///
    /// From a conversation entered via the room list this returns to the
    /// list and refreshes it. Anything else closes the chat feature, except
    /// an in-flight room entry, which returns to wherever it started.
    pub fn back(&mut self) -> BackOutcome {
        match self.state {
            ChatState::Conversation { .. } if self.entry == Some(EntryMode::FromRoomList) => {
                self.leave_room();
                self.transition(ChatState::RoomList {
                    rooms: self.known_rooms.clone(),
                });
                self.load_rooms();
                BackOutcome::ShowRoomList
            }
            ChatState::EnteringRoom { .. } => {
                match self.entering.take().map(|pending| pending.return_to) {
                    Some(origin @ ChatState::RoomList { .. }) => {
                        self.transition(origin);
                        BackOutcome::ShowRoomList
                    }
                    _ => {
                        self.close();
                        BackOutcome::ExitChat
                    }
                }
            }
            _ => {
                self.close();
                BackOutcome::ExitChat
            }
        }
    }

    /// Closes the chat feature and stops refreshing.
    pub fn close(&mut self) {
        self.leave_room();
        self.entering = None;
        self.input.clear();
        self.transition(ChatState::Idle);
    }

    /// Sends the pending input to the open room.
    ///
    /// The trimmed text is sent. On success the input is cleared and the
    /// room re-fetched; on failure the input is kept and a notice is set.
    ///
    /// # Errors
    ///
    /// [`ChatError::InvalidState`] outside a conversation,
    /// [`ChatError::SendInProgress`] while a send is unacknowledged, or
    /// [`ChatError::Validation`] if the input is blank or too large.
    pub fn send(&mut self) -> Result<(), ChatError> {
        let Some(room) = self.state.room() else {
            return Err(self.invalid("send a message"));
        };
        let room_id = room.id;
        if self.pending_send.is_some() {
            return Err(ChatError::SendInProgress);
        }
        let content = validate_content(&self.input)?.to_string();

        let request = self.next_request();
        self.pending_send = Some(PendingSend { request, room_id });
        let backend = Arc::clone(&self.backend);
        self.spawn_call(async move {
            let result = backend.send_message(room_id, &content).await;
            ChatEvent::MessageSent {
                request,
                room_id,
                content,
                result,
            }
        });
        Ok(())
    }

    /// Re-fetches the open room now.
    ///
    /// # Errors
    ///
    /// [`ChatError::InvalidState`] outside a conversation.
    pub fn refresh_now(&mut self) -> Result<(), ChatError> {
        if self.state.room().is_none() {
            return Err(self.invalid("refresh messages"));
        }
        self.fetch_messages();
        Ok(())
    }

    /// Waits for the next background completion or refresh trigger.
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        self.events_rx.recv().await
    }

    /// Waits for the next event and applies it.
    pub async fn pump(&mut self) -> EventOutcome {
        match self.events_rx.recv().await {
            Some(event) => self.handle_event(event),
            None => EventOutcome::Unchanged,
        }
    }

    /// Applies an already-queued event, if there is one.
    pub fn try_pump(&mut self) -> Option<EventOutcome> {
        let event = self.events_rx.try_recv().ok()?;
        Some(self.handle_event(event))
    }

    /// Applies one event.
    pub fn handle_event(&mut self, event: ChatEvent) -> EventOutcome {
        match event {
            ChatEvent::RoomsLoaded { request, result } => self.on_rooms_loaded(request, result),
            ChatEvent::RoomOpened {
                request,
                product_id,
                result,
            } => self.on_room_opened(request, product_id, result),
            ChatEvent::MessagesFetched { ticket, result } => {
                self.on_messages_fetched(ticket, result)
            }
            ChatEvent::MessageSent {
                request,
                room_id,
                content,
                result,
            } => self.on_message_sent(request, room_id, &content, result),
            ChatEvent::RefreshDue { room_id } => self.on_refresh_due(room_id),
        }
    }

    fn on_rooms_loaded(
        &mut self,
        request: u64,
        result: Result<Vec<ChatRoom>, BackendError>,
    ) -> EventOutcome {
        if request != self.rooms_request {
            return EventOutcome::Unchanged;
        }
        match result {
            Ok(rooms) => {
                tracing::debug!(count = rooms.len(), "room list loaded");
                self.known_rooms = rooms;
                if matches!(
                    self.state,
                    ChatState::LoadingRoomList | ChatState::RoomList { .. }
                ) {
                    self.transition(ChatState::RoomList {
                        rooms: self.known_rooms.clone(),
                    });
                    EventOutcome::Updated
                } else {
                    EventOutcome::Unchanged
                }
            }
            Err(error) if matches!(self.state, ChatState::LoadingRoomList) => {
                tracing::warn!(error = %error, "room list load failed");
                self.transition(ChatState::Error {
                    context: ChatNotice {
                        action: ChatAction::LoadRooms,
                        error,
                    },
                });
                EventOutcome::Updated
            }
            Err(error) => {
                tracing::warn!(error = %error, "room list refresh failed");
                EventOutcome::Unchanged
            }
        }
    }

    fn on_room_opened(
        &mut self,
        request: u64,
        product_id: ProductId,
        result: Result<ChatRoom, BackendError>,
    ) -> EventOutcome {
        let pending = match self.entering.take() {
            Some(pending)
                if pending.request == request
                    && self.state == (ChatState::EnteringRoom { product_id }) =>
            {
                pending
            }
            other => {
                self.entering = other;
                tracing::debug!(
                    %product_id,
                    request,
                    "ignoring room opened after entry was abandoned"
                );
                return EventOutcome::Unchanged;
            }
        };
        match result {
            Ok(room) => {
                tracing::info!(room_id = %room.id, %product_id, "entered chat room");
                self.enter_conversation(room, pending.mode);
                // The room may be new; keep the list current for "back".
                self.load_rooms();
            }
            Err(error) => {
                tracing::warn!(%product_id, error = %error, "could not open chat room");
                self.notice = Some(ChatNotice {
                    action: ChatAction::OpenRoom,
                    error,
                });
                self.transition(pending.return_to);
            }
        }
        EventOutcome::Updated
    }

    fn on_messages_fetched(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<ChatMessage>, BackendError>,
    ) -> EventOutcome {
        let current = self.sync.complete(ticket);
        match result {
            Ok(snapshot) if current => {
                match &mut self.state {
                    ChatState::Conversation { room, messages } if room.id == ticket.room_id() => {
                        *messages = snapshot;
                        EventOutcome::Updated
                    }
                    _ => EventOutcome::Unchanged,
                }
            }
            Ok(_) => {
                tracing::trace!(
                    room_id = %ticket.room_id(),
                    seq = ticket.seq(),
                    "discarding stale message snapshot"
                );
                EventOutcome::Unchanged
            }
            Err(error) if !current || error.is_silent_during_poll() => {
                tracing::debug!(
                    room_id = %ticket.room_id(),
                    error = %error,
                    "message fetch failed"
                );
                EventOutcome::Unchanged
            }
            Err(error) => {
                tracing::warn!(room_id = %ticket.room_id(), error = %error, "message fetch failed");
                self.notice = Some(ChatNotice {
                    action: ChatAction::RefreshMessages,
                    error,
                });
                EventOutcome::Updated
            }
        }
    }

    fn on_message_sent(
        &mut self,
        request: u64,
        room_id: RoomId,
        content: &str,
        result: Result<ChatMessage, BackendError>,
    ) -> EventOutcome {
        if self.pending_send != Some(PendingSend { request, room_id }) {
            tracing::debug!(%room_id, request, "ignoring send result from an abandoned visit");
            return EventOutcome::Unchanged;
        }
        self.pending_send = None;
        match result {
            Ok(message) => {
                tracing::debug!(%room_id, message_id = %message.id, "message sent");
                if self.input.trim() == content {
                    self.input.clear();
                }
                self.fetch_messages();
                EventOutcome::Updated
            }
            Err(error) => {
                tracing::warn!(%room_id, error = %error, "message send failed");
                self.notice = Some(ChatNotice {
                    action: ChatAction::SendMessage,
                    error,
                });
                EventOutcome::Updated
            }
        }
    }

    fn on_refresh_due(&mut self, room_id: RoomId) -> EventOutcome {
        if self.sync.active_room() != Some(room_id) {
            return EventOutcome::Unchanged;
        }
        if self.sync.in_flight() {
            tracing::trace!(%room_id, "skipping refresh tick, fetch still in flight");
            return EventOutcome::Unchanged;
        }
        self.fetch_messages();
        EventOutcome::Unchanged
    }

    fn enter_conversation(&mut self, room: ChatRoom, mode: EntryMode) {
        self.guard = None;
        self.pending_send = None;
        self.sync.switch_to(room.id);
        self.entry = Some(mode);
        self.input.clear();

        let room_id = room.id;
        self.transition(ChatState::Conversation {
            room,
            messages: Vec::new(),
        });
        self.fetch_messages();
        self.guard = Some(self.refresh.start(room_id, self.events_tx.clone()));
    }

    fn leave_room(&mut self) {
        self.guard = None;
        self.pending_send = None;
        self.sync.leave();
        self.entry = None;
    }

    const fn next_request(&mut self) -> u64 {
        self.requests += 1;
        self.requests
    }

    fn load_rooms(&mut self) {
        let request = self.next_request();
        self.rooms_request = request;
        let backend = Arc::clone(&self.backend);
        self.spawn_call(async move {
            ChatEvent::RoomsLoaded {
                request,
                result: backend.list_my_rooms().await,
            }
        });
    }

    fn fetch_messages(&mut self) {
        let Some(ticket) = self.sync.issue() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        self.spawn_call(async move {
            ChatEvent::MessagesFetched {
                ticket,
                result: backend.list_messages(ticket.room_id()).await,
            }
        });
    }

    fn spawn_call(&self, call: impl Future<Output = ChatEvent> + Send + 'static) {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            // The controller may be gone by now.
            let _ = events.send(call.await);
        });
    }

    fn transition(&mut self, next: ChatState) {
        if self.state.name() != next.name() {
            tracing::debug!(from = self.state.name(), to = next.name(), "chat state");
        }
        self.state = next;
    }

    const fn invalid(&self, action: &'static str) -> ChatError {
        ChatError::InvalidState {
            action,
            state: self.state.name(),
        }
    }
}
