//! Membership invariants under arbitrary connect/join/disconnect sequences.

use std::collections::{HashMap, HashSet};

use cowatch_proto::Envelope;
use cowatch_relay::{RelayAction, RelayRooms};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Connect { connection: u64, room: u8 },
    Join { connection: u64 },
    Chat { connection: u64 },
    Disconnect { connection: u64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8u64, 0..3u8).prop_map(|(connection, room)| Op::Connect { connection, room }),
        (0..8u64).prop_map(|connection| Op::Join { connection }),
        (0..8u64).prop_map(|connection| Op::Chat { connection }),
        (0..8u64).prop_map(|connection| Op::Disconnect { connection }),
    ]
}

fn room_name(room: u8) -> String {
    format!("room{room}")
}

proptest! {
    #[test]
    fn online_count_tracks_joined_members(ops in prop::collection::vec(op(), 0..64)) {
        let mut rooms = RelayRooms::new();
        // Model: connection -> (room, joined)
        let mut model: HashMap<u64, (String, bool)> = HashMap::new();

        for op in ops {
            let actions = match op {
                Op::Connect { connection, room } => {
                    if model.contains_key(&connection) {
                        continue;
                    }
                    rooms.connect(connection, room_name(room));
                    model.insert(connection, (room_name(room), false));
                    Vec::new()
                },
                Op::Join { connection } => {
                    let actions = rooms.frame(connection, &Envelope::join(format!("u{connection}")).encode().unwrap());
                    if let Some((_, joined)) = model.get_mut(&connection) {
                        *joined = true;
                    }
                    actions
                },
                Op::Chat { connection } => {
                    rooms.frame(connection, &Envelope::chat("hi", format!("u{connection}")).encode().unwrap())
                },
                Op::Disconnect { connection } => {
                    let actions = rooms.disconnect(connection);
                    model.remove(&connection);
                    actions
                },
            };

            // Every frame goes to a live connection, at most once per action batch
            let mut recipients = HashSet::new();
            for RelayAction::Send { connection, .. } in &actions {
                prop_assert!(model.contains_key(connection));
                prop_assert!(recipients.insert(*connection));
            }

            for room in 0..3 {
                let name = room_name(room);
                let joined = model.values().filter(|(r, j)| *r == name && *j).count();
                let connected = model.values().filter(|(r, _)| *r == name).count();
                prop_assert_eq!(rooms.online_count(&name) as usize, joined);
                prop_assert_eq!(rooms.connections(&name), connected);
            }
        }

        prop_assert_eq!(rooms.connection_count(), model.len());
    }
}
