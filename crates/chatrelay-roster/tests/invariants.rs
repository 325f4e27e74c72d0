//! Property tests: the roster's uniqueness and pairing invariants hold
//! after any sequence of register / rename / unregister calls.

use std::collections::HashSet;
use std::net::SocketAddr;

use chatrelay_roster::{OutboundReceiver, OutboundWriter, Roster};
use chatrelay_transport::ConnectionId;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Register(u64, String),
    Rename(u64, String),
    Unregister(u64),
}

fn arb_name() -> impl Strategy<Value = String> {
    // A tiny alphabet so collisions (and _clone chains) are common.
    prop_oneof![
        Just("Steve".to_string()),
        Just("Bob".to_string()),
        Just("Steve_clone".to_string()),
        "[a-c]{1,2}",
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..6, arb_name()).prop_map(|(id, name)| Op::Register(id, name)),
        (0u64..6, arb_name()).prop_map(|(id, name)| Op::Rename(id, name)),
        (0u64..6).prop_map(Op::Unregister),
    ]
}

fn origin() -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], 9999))
}

proptest! {
    #[test]
    fn names_unique_and_paired_with_writers(ops in prop::collection::vec(arb_op(), 0..60)) {
        let mut roster = Roster::new();
        // Keep receivers alive so writers stay deliverable.
        let mut receivers: Vec<OutboundReceiver> = Vec::new();

        for op in ops {
            match op {
                Op::Register(id, name) => {
                    let (writer, rx) = OutboundWriter::channel(ConnectionId::new(id));
                    receivers.push(rx);
                    let _ = roster.register(ConnectionId::new(id), origin(), &name, writer);
                }
                Op::Rename(id, name) => {
                    let _ = roster.rename(ConnectionId::new(id), &name);
                }
                Op::Unregister(id) => {
                    roster.unregister(ConnectionId::new(id));
                }
            }

            let names = roster.names_snapshot();
            let unique: HashSet<&String> = names.iter().collect();
            prop_assert_eq!(unique.len(), names.len(), "duplicate name in {:?}", names);
            prop_assert_eq!(names.len(), roster.len());

            for name in &names {
                let id = roster.lookup_by_name(name);
                prop_assert!(id.is_some());
                let entry = roster.get(id.unwrap()).unwrap();
                prop_assert_eq!(entry.name(), name.as_str());
                prop_assert_eq!(entry.writer().id(), id.unwrap());
            }
        }
    }

    #[test]
    fn same_name_connects_keep_at_most_one_plain(count in 1usize..8) {
        let mut roster = Roster::new();
        let mut receivers = Vec::new();
        let mut assigned = Vec::new();

        for id in 0..count as u64 {
            let (writer, rx) = OutboundWriter::channel(ConnectionId::new(id));
            receivers.push(rx);
            assigned.push(roster.register(ConnectionId::new(id), origin(), "Steve", writer).unwrap());
        }

        prop_assert_eq!(assigned.iter().filter(|n| n.as_str() == "Steve").count(), 1);
        let unique: HashSet<&String> = assigned.iter().collect();
        prop_assert_eq!(unique.len(), count);
        prop_assert!(assigned.iter().all(|n| n.starts_with("Steve")));
    }
}
