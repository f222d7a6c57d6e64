//! Snapshot synchronization for the open conversation.
//!
//! Every message fetch returns the room's full history, and the displayed
//! list is replaced wholesale. Fetches can overlap (timer tick, post-send
//! refresh, manual refresh), so each one is stamped with a [`FetchTicket`]
//! and only the newest ticket for the active room may be applied.

use marketchat_proto::model::RoomId;

/// Identifies one issued message fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    room_id: RoomId,
    seq: u64,
}

impl FetchTicket {
    /// Room the fetch was issued for.
    #[must_use]
    pub const fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Issue order across the whole session.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }
}

/// Latest-wins bookkeeping for snapshot fetches.
///
/// # Invariant
///
/// A result is applied iff its ticket names the active room and is the most
/// recently issued ticket. Switching or leaving the room invalidates every
/// outstanding ticket.
#[derive(Debug, Default)]
pub struct SnapshotSync {
    next_seq: u64,
    active: Option<RoomId>,
    latest: Option<u64>,
    in_flight: bool,
}

impl SnapshotSync {
    /// Creates a tracker with no active room.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `room` the active room, invalidating outstanding tickets.
    pub fn switch_to(&mut self, room: RoomId) {
        self.active = Some(room);
        self.latest = None;
        self.in_flight = false;
    }

    /// Clears the active room, invalidating outstanding tickets.
    pub fn leave(&mut self) {
        self.active = None;
        self.latest = None;
        self.in_flight = false;
    }

    /// The room fetches are currently being issued for.
    #[must_use]
    pub const fn active_room(&self) -> Option<RoomId> {
        self.active
    }

    /// Returns `true` while the newest issued fetch has not completed.
    #[must_use]
    pub const fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Issues a ticket for a new fetch of the active room.
    ///
    /// Returns `None` when no room is active.
    pub fn issue(&mut self) -> Option<FetchTicket> {
        let room_id = self.active?;
        self.next_seq += 1;
        self.latest = Some(self.next_seq);
        self.in_flight = true;
        Some(FetchTicket {
            room_id,
            seq: self.next_seq,
        })
    }

    /// Returns `true` if a result carrying `ticket` may still be applied.
    #[must_use]
    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        self.active == Some(ticket.room_id) && self.latest == Some(ticket.seq)
    }

    /// Records completion of the fetch behind `ticket`, successful or not.
    ///
    /// Returns `true` if the ticket was current, meaning a successful result
    /// should replace the displayed snapshot.
    pub fn complete(&mut self, ticket: FetchTicket) -> bool {
        let current = self.is_current(ticket);
        if current {
            self.in_flight = false;
        }
        current
    }
}
