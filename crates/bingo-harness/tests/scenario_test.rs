//! End-to-end scenarios on a simulated table.
//!
//! Each test drives two real engines through a real coordinator and checks
//! what both peers end up agreeing on.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bingo_core::{SessionAction, SessionConfig, SessionError, SessionResult, TurnState};
use bingo_harness::{FaultConfig, SimTable};
use bingo_proto::{Message, Number};

fn sequential() -> Vec<Number> {
    (1..=25).collect()
}

fn reversed() -> Vec<Number> {
    (1..=25).rev().collect()
}

fn untimed() -> SessionConfig {
    SessionConfig::default().with_peer_timeout(None)
}

/// Alternate calls starting with `first` until someone wins. Returns the
/// number of calls made.
fn play_out(table: &mut SimTable, first: usize) -> usize {
    let mut seat = first;
    let mut calls = 0;
    while table.engine(0).result().is_none() {
        let number = table.pick(seat, 0).unwrap();
        table.call(seat, number).unwrap();
        seat = 1 - seat;
        calls += 1;
        assert!(calls <= 25, "game did not terminate");
    }
    calls
}

#[test]
fn start_hands_turn_to_exactly_one_seat() {
    let mut table = SimTable::new(1, untimed(), [sequential(), reversed()]).unwrap();
    let first = table.start().unwrap();

    assert_eq!(table.engine(first).turn_state(), TurnState::LocalTurn);
    assert_eq!(table.engine(1 - first).turn_state(), TurnState::OpponentTurn);
    assert!(table.coordinator_started());
    assert!(table.delivery_errors().is_empty());
    assert!(table.coordinator_errors().is_empty());
}

#[test]
fn full_game_has_one_winner() {
    let mut table = SimTable::new(3, untimed(), [sequential(), reversed()]).unwrap();
    let first = table.start().unwrap();
    play_out(&mut table, first);

    let results = [table.engine(0).result().unwrap(), table.engine(1).result().unwrap()];
    assert_ne!(results[0], results[1]);
    assert!(results.contains(&SessionResult::LocalWin));

    let ledger0: Vec<Number> = table.engine(0).called_numbers().numbers().collect();
    let ledger1: Vec<Number> = table.engine(1).called_numbers().numbers().collect();
    assert_eq!(ledger0, ledger1);

    // The coordinator closes the round on the win announcement.
    assert!(!table.coordinator_started());
    assert!(table.delivery_errors().is_empty());
}

#[test]
fn identical_boards_go_to_the_caller() {
    let mut table = SimTable::new(5, untimed(), [sequential(), sequential()]).unwrap();
    let first = table.start().unwrap();
    let calls = play_out(&mut table, first);

    // Both boards complete every line together, so whoever made the last
    // call wins.
    let last_caller = if calls % 2 == 1 { first } else { 1 - first };
    assert_eq!(table.engine(last_caller).result(), Some(SessionResult::LocalWin));
    assert_eq!(table.engine(1 - last_caller).result(), Some(SessionResult::OpponentWin));
    assert_eq!(table.engine(0).progress_count(), table.engine(1).progress_count());
}

#[test]
fn winner_observes_session_end() {
    let mut table = SimTable::new(11, untimed(), [sequential(), reversed()]).unwrap();
    let first = table.start().unwrap();
    play_out(&mut table, first);

    let winner = (0..2).find(|&s| table.engine(s).result() == Some(SessionResult::LocalWin)).unwrap();
    let ended: Vec<SessionAction> = table
        .notifications(winner)
        .into_iter()
        .filter(|a| matches!(a, SessionAction::SessionEnded { .. }))
        .collect();
    assert_eq!(ended, vec![SessionAction::SessionEnded { result: SessionResult::LocalWin }]);
}

#[test]
fn coin_flip_is_deterministic_per_seed() {
    let mut firsts = Vec::new();
    for seed in 0..32 {
        let mut a = SimTable::new(seed, untimed(), [sequential(), reversed()]).unwrap();
        let mut b = SimTable::new(seed, untimed(), [sequential(), reversed()]).unwrap();
        let first = a.start().unwrap();
        assert_eq!(first, b.start().unwrap(), "seed {seed}");
        firsts.push(first);
    }

    assert!(firsts.contains(&0));
    assert!(firsts.contains(&1));
}

#[test]
fn silent_opponent_times_out() {
    let mut table = SimTable::new(7, SessionConfig::default(), [sequential(), reversed()]).unwrap();
    let first = table.start().unwrap();
    let waiting = 1 - first;

    table.advance(Duration::from_secs(119));
    assert_eq!(table.engine(waiting).turn_state(), TurnState::OpponentTurn);

    table.advance(Duration::from_secs(1));
    assert_eq!(table.engine(waiting).turn_state(), TurnState::PeerLost);
    assert!(
        table
            .notifications(waiting)
            .iter()
            .any(|a| matches!(a, SessionAction::SessionAborted { .. }))
    );

    // The seat holding the turn is not waiting on anyone.
    assert_eq!(table.engine(first).turn_state(), TurnState::LocalTurn);
}

#[test]
fn calls_keep_the_opponent_alive() {
    let mut table = SimTable::new(7, SessionConfig::default(), [sequential(), reversed()]).unwrap();
    let first = table.start().unwrap();

    let mut seat = first;
    for _ in 0..4 {
        table.advance(Duration::from_secs(100));
        let number = table.pick(seat, 0).unwrap();
        table.call(seat, number).unwrap();
        seat = 1 - seat;
    }

    assert!(table.engine(0).turn_state().is_playing());
    assert!(table.engine(1).turn_state().is_playing());
}

#[test]
fn disconnect_aborts_both_sides() {
    let mut table = SimTable::new(9, untimed(), [sequential(), reversed()]).unwrap();
    let first = table.start().unwrap();
    let number = table.pick(first, 0).unwrap();
    table.call(first, number).unwrap();

    table.disconnect(first);

    assert_eq!(table.engine(0).turn_state(), TurnState::PeerLost);
    assert_eq!(table.engine(1).turn_state(), TurnState::PeerLost);
    assert!(
        table
            .notifications(1 - first)
            .iter()
            .any(|a| matches!(a, SessionAction::SessionAborted { .. }))
    );

    let number = table.pick(1 - first, 0).unwrap();
    assert_eq!(table.call(1 - first, number), Err(SessionError::PeerLost));
}

#[test]
fn disconnect_after_win_keeps_result() {
    let mut table = SimTable::new(13, untimed(), [sequential(), reversed()]).unwrap();
    let first = table.start().unwrap();
    play_out(&mut table, first);
    let results = [table.engine(0).result(), table.engine(1).result()];

    table.disconnect(0);

    assert_eq!(table.engine(0).result(), results[0]);
    assert_eq!(table.engine(1).result(), results[1]);
    assert_eq!(table.engine(1).turn_state(), TurnState::Finished);
}

#[test]
fn duplicated_deliveries_are_harmless() {
    for seed in 0..8 {
        let mut table = SimTable::new(seed, untimed(), [sequential(), reversed()])
            .unwrap()
            .with_faults(FaultConfig { duplicate_rate: 0.5 });
        let first = table.start().unwrap();
        play_out(&mut table, first);

        assert!(table.delivery_errors().is_empty(), "seed {seed}: {:?}", table.delivery_errors());
        let ledger0: Vec<Number> = table.engine(0).called_numbers().numbers().collect();
        let ledger1: Vec<Number> = table.engine(1).called_numbers().numbers().collect();
        assert_eq!(ledger0, ledger1);
        assert_ne!(table.engine(0).result(), table.engine(1).result());
    }
}

#[test]
fn call_out_of_turn_is_rejected_by_holder() {
    let mut table = SimTable::new(17, untimed(), [sequential(), reversed()]).unwrap();
    let holder = table.start().unwrap();
    let other = 1 - holder;

    let call = Message::Call {
        participant: table.participant(other).clone(),
        session: table.session().clone(),
        number: 13,
        lines: 0,
    };
    table.inject(other, call);

    assert!(table.delivery_errors().iter().any(|(seat, e)| {
        *seat == holder
            && *e == SessionError::OutOfTurn { participant: table.participant(other).clone() }
    }));
    assert_eq!(table.engine(holder).turn_state(), TurnState::LocalTurn);
    assert!(table.engine(holder).called_numbers().is_empty());
}

#[test]
fn play_again_after_win() {
    let mut table = SimTable::new(21, untimed(), [sequential(), reversed()]).unwrap();
    let first = table.start().unwrap();
    play_out(&mut table, first);

    let first = table.rematch([reversed(), sequential()]).unwrap();

    assert_eq!(table.engine(first).turn_state(), TurnState::LocalTurn);
    assert_eq!(table.engine(1 - first).turn_state(), TurnState::OpponentTurn);
    assert!(table.engine(0).called_numbers().is_empty());
    assert!(table.coordinator_started());

    play_out(&mut table, first);
    assert_ne!(table.engine(0).result(), table.engine(1).result());
}

#[test]
fn play_again_drops_echoes_from_last_game() {
    // Identical boards: the caller of the deciding number always wins.
    let mut table = SimTable::new(23, untimed(), [sequential(), sequential()]).unwrap();
    let mut seat = table.start().unwrap();
    loop {
        let number = table.pick(seat, 0).unwrap();
        table.call_in_flight(seat, number).unwrap();
        if table.engine(seat).result().is_some() {
            break;
        }
        table.deliver_pending();
        seat = 1 - seat;
    }
    let winner = seat;

    // Both players restart while the winning call and win are still relayed.
    let first = table.rematch([reversed(), sequential()]).unwrap();

    assert!(table.engine(0).called_numbers().is_empty());
    assert!(table.engine(1).called_numbers().is_empty());
    assert!(table.delivery_errors().iter().all(|(s, _)| *s != winner));
    assert_eq!(table.engine(first).turn_state(), TurnState::LocalTurn);

    play_out(&mut table, first);
    assert_ne!(table.engine(0).result(), table.engine(1).result());
    let ledger0: Vec<Number> = table.engine(0).called_numbers().numbers().collect();
    let ledger1: Vec<Number> = table.engine(1).called_numbers().numbers().collect();
    assert_eq!(ledger0, ledger1);
}
