//! Refresh triggers for the open conversation.
//!
//! A [`RefreshSource`] tells the controller when to re-fetch the active
//! room. [`IntervalRefresh`] is the polling implementation; a push-based
//! source only needs to emit the same [`ChatEvent::RefreshDue`] events.
//! Whatever the source, the returned [`RefreshGuard`] stops it when dropped.

use std::sync::Arc;
use std::time::Duration;

use marketchat_proto::model::RoomId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::ChatEvent;

/// Default period between background message fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Starts refresh triggers for one room.
pub trait RefreshSource: Send {
    /// Begins emitting [`ChatEvent::RefreshDue`] for `room_id` into
    /// `events` until the returned guard is dropped.
    fn start(&self, room_id: RoomId, events: mpsc::UnboundedSender<ChatEvent>) -> RefreshGuard;
}

/// Stops its refresh source on drop.
#[derive(Debug)]
pub struct RefreshGuard {
    token: CancellationToken,
}

impl RefreshGuard {
    /// Wraps a cancellation token owned by a refresh source.
    #[must_use]
    pub const fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Returns `true` until the guard is dropped.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Fixed-period polling.
#[derive(Debug, Clone, Copy)]
pub struct IntervalRefresh {
    period: Duration,
}

impl IntervalRefresh {
    /// Polls every `period`. A zero period falls back to
    /// [`DEFAULT_POLL_INTERVAL`].
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let period = if period.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            period
        };
        Self { period }
    }

    /// The polling period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

impl Default for IntervalRefresh {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl RefreshSource for IntervalRefresh {
    fn start(&self, room_id: RoomId, events: mpsc::UnboundedSender<ChatEvent>) -> RefreshGuard {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let period = self.period;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if events.send(ChatEvent::RefreshDue { room_id }).is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::trace!(%room_id, "message polling stopped");
        });

        tracing::debug!(%room_id, period_ms = period.as_millis(), "message polling started");
        RefreshGuard::new(token)
    }
}

struct Subscription {
    room_id: RoomId,
    events: mpsc::UnboundedSender<ChatEvent>,
    token: CancellationToken,
}

/// Refresh triggered from outside, e.g. by a push notification.
///
/// Clones share the subscription; the controller holds one and the
/// notifier another.
#[derive(Clone, Default)]
pub struct ManualRefresh {
    active: Arc<Mutex<Option<Subscription>>>,
}

impl ManualRefresh {
    /// Creates a source with no subscriber.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the subscribed controller to re-fetch its room.
    ///
    /// Returns `false` if no room is subscribed or its guard was dropped.
    pub fn notify(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(sub) if !sub.token.is_cancelled() => sub
                .events
                .send(ChatEvent::RefreshDue {
                    room_id: sub.room_id,
                })
                .is_ok(),
            _ => false,
        }
    }
}

impl RefreshSource for ManualRefresh {
    fn start(&self, room_id: RoomId, events: mpsc::UnboundedSender<ChatEvent>) -> RefreshGuard {
        let token = CancellationToken::new();
        *self.active.lock() = Some(Subscription {
            room_id,
            events,
            token: token.clone(),
        });
        RefreshGuard::new(token)
    }
}
