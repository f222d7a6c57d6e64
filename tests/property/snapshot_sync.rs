//! Property-based tests for latest-wins snapshot synchronization.
//!
//! Uses proptest to drive `SnapshotSync` through arbitrary interleavings of
//! fetch issue, out-of-order completion, room switches and leaves, and
//! checks it against a one-line model: a completion applies iff its ticket
//! is the newest one issued since the last switch.

#![allow(clippy::unwrap_used)]

use marketchat::chat::{FetchTicket, SnapshotSync};
use marketchat_proto::model::RoomId;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Issue,
    Complete(usize),
    Switch(u64),
    Leave,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Issue),
        4 => any::<usize>().prop_map(Op::Complete),
        2 => (1u64..4).prop_map(Op::Switch),
        1 => Just(Op::Leave),
    ]
}

/// A random completion order for between one and nine fetches.
fn completion_order() -> impl Strategy<Value = Vec<usize>> {
    (1usize..10).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #[test]
    fn completion_applies_only_newest_ticket(ops in prop::collection::vec(arb_op(), 0..80)) {
        let mut sync = SnapshotSync::new();
        let mut outstanding: Vec<FetchTicket> = Vec::new();
        let mut newest: Option<FetchTicket> = None;
        let mut last_applied: Option<FetchTicket> = None;

        for op in ops {
            match op {
                Op::Issue => {
                    let ticket = sync.issue();
                    prop_assert_eq!(ticket.is_some(), sync.active_room().is_some());
                    if let Some(ticket) = ticket {
                        prop_assert_eq!(Some(ticket.room_id()), sync.active_room());
                        outstanding.push(ticket);
                        newest = Some(ticket);
                    }
                }
                Op::Complete(pick) => {
                    if outstanding.is_empty() {
                        continue;
                    }
                    let ticket = outstanding.remove(pick % outstanding.len());
                    let applied = sync.complete(ticket);
                    prop_assert_eq!(applied, newest == Some(ticket));
                    if applied {
                        prop_assert_eq!(Some(ticket.room_id()), sync.active_room());
                        if let Some(previous) = last_applied {
                            prop_assert!(ticket.seq() > previous.seq());
                        }
                        last_applied = Some(ticket);
                        prop_assert!(!sync.in_flight());
                    }
                }
                Op::Switch(room) => {
                    sync.switch_to(RoomId::new(room));
                    newest = None;
                }
                Op::Leave => {
                    sync.leave();
                    newest = None;
                }
            }
        }
    }

    #[test]
    fn newest_fetch_always_wins_regardless_of_order(order in completion_order()) {
        let mut sync = SnapshotSync::new();
        sync.switch_to(RoomId::new(1));
        let tickets: Vec<FetchTicket> = order.iter().filter_map(|_| sync.issue()).collect();
        let newest = *tickets.last().unwrap();

        let applied: Vec<_> = order
            .iter()
            .map(|&i| tickets[i])
            .filter(|t| sync.complete(*t))
            .collect();
        prop_assert_eq!(applied, vec![newest]);
    }
}
