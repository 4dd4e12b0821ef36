//! Fuzz target for the session coordinator
//!
//! Applies arbitrary join, ready, relay and disconnect sequences from a small
//! pool of connections and identities.
//!
//! # Invariants
//!
//! - No room ever exceeds its capacity
//! - Messages only reach connections joined to the message's session
//! - NEVER panic on any message sequence

#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use bingo_harness::SimEnv;
use bingo_proto::{Message, ParticipantId, SessionId};
use bingo_server::{ConnectionId, CoordinatorConfig, RoomAction, RoomManager};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Step {
    Join { conn: u8, who: u8, session: u8 },
    Ready { conn: u8, who: u8, session: u8 },
    Call { conn: u8, who: u8, session: u8, number: u16, lines: u8 },
    Win { conn: u8, who: u8, session: u8 },
    Disconnect { conn: u8 },
}

fn participant(who: u8) -> ParticipantId {
    ParticipantId::new(format!("p{}", who % 4))
}

fn session(id: u8) -> SessionId {
    SessionId::new(format!("s{}", id % 3))
}

fn conn(id: u8) -> ConnectionId {
    ConnectionId::from(id % 6)
}

fuzz_target!(|input: (u64, Vec<Step>)| {
    let (seed, steps) = input;
    let config = CoordinatorConfig { room_capacity: 2, max_rooms: 2 };
    let mut rooms = RoomManager::new(SimEnv::with_seed(seed), config);
    // Shadow of which session each connection joined.
    let mut bound: HashMap<ConnectionId, SessionId> = HashMap::new();

    for step in steps.iter().take(512) {
        let (from, message) = match step {
            Step::Disconnect { conn: c } => {
                bound.remove(&conn(*c));
                let actions = rooms.disconnect(conn(*c));
                check_targets(&bound, &actions);
                continue;
            },
            Step::Join { conn: c, who, session: s } => {
                (conn(*c), Message::Join { participant: participant(*who), session: session(*s) })
            },
            Step::Ready { conn: c, who, session: s } => {
                (conn(*c), Message::Ready { participant: participant(*who), session: session(*s) })
            },
            Step::Call { conn: c, who, session: s, number, lines } => (
                conn(*c),
                Message::Call {
                    participant: participant(*who),
                    session: session(*s),
                    number: *number,
                    lines: *lines,
                },
            ),
            Step::Win { conn: c, who, session: s } => {
                (conn(*c), Message::Win { participant: participant(*who), session: session(*s) })
            },
        };

        let is_join = matches!(message, Message::Join { .. });
        let target_session = message.session().clone();
        if let Ok(actions) = rooms.handle(from, message) {
            if is_join {
                bound.insert(from, target_session);
            }
            check_targets(&bound, &actions);
        }

        for id in 0..3 {
            assert!(rooms.members(&session(id)).len() <= 2, "room over capacity");
        }
        assert!(rooms.room_count() <= 2);
    }
});

fn check_targets(bound: &HashMap<ConnectionId, SessionId>, actions: &[RoomAction]) {
    for RoomAction::Send { conn, message } in actions {
        assert_eq!(bound.get(conn), Some(message.session()), "message leaked across sessions");
    }
}
