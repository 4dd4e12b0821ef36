//! Model table - the reference implementation.
//!
//! Two boards, one shared call list and the win rule, with instant delivery
//! and no clock. It is the oracle the simulated system is compared against.

use bingo_proto::Number;

use super::operation::{Operation, OperationError, OperationResult, pick_uncalled};

/// What one seat can observe about the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatView {
    /// Called numbers in order.
    pub ledger: Vec<Number>,
    /// Completed lines on this seat's board.
    pub progress: usize,
    /// Winning seat, as this seat sees it.
    pub winner: Option<usize>,
    /// Whether this seat may call next.
    pub holds_turn: bool,
    /// Whether the session was abandoned.
    pub lost: bool,
}

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Per-seat views, indexed by seat.
    pub seats: [SeatView; 2],
}

/// Reference model of a started two-player table.
#[derive(Debug, Clone)]
pub struct ModelTable {
    /// Row-major boards.
    boards: [Vec<Number>; 2],
    size: usize,
    threshold: usize,
    calls: Vec<Number>,
    holder: usize,
    winner: Option<usize>,
    aborted: bool,
    disconnected: [bool; 2],
}

impl ModelTable {
    /// Model a table whose boards are `boards` (row-major, `size`×`size`)
    /// with `first` holding the opening turn.
    pub fn new(boards: [Vec<Number>; 2], size: usize, threshold: usize, first: usize) -> Self {
        Self {
            boards,
            size,
            threshold,
            calls: Vec::new(),
            holder: first % 2,
            winner: None,
            aborted: false,
            disconnected: [false; 2],
        }
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Call { seat, pick } => self.apply_call(usize::from(*seat) % 2, *pick),
            // Replays are idempotent and the model has no clock.
            Operation::Replay { .. } | Operation::AdvanceTime { .. } => OperationResult::Ok,
            Operation::Disconnect { seat } => {
                let seat = usize::from(*seat) % 2;
                if !self.disconnected[seat] {
                    self.disconnected[seat] = true;
                    if self.winner.is_none() {
                        self.aborted = true;
                    }
                }
                OperationResult::Ok
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let view = |seat: usize| SeatView {
            ledger: self.calls.clone(),
            progress: self.progress(seat),
            winner: self.winner,
            holds_turn: !self.aborted && self.winner.is_none() && self.holder == seat,
            lost: self.aborted,
        };
        ObservableState { seats: [view(0), view(1)] }
    }

    fn apply_call(&mut self, seat: usize, pick: u8) -> OperationResult {
        if self.winner.is_some() {
            return OperationResult::Error(OperationError::IllegalState);
        }
        if self.aborted {
            return OperationResult::Error(OperationError::PeerLost);
        }
        if self.holder != seat {
            return OperationResult::Error(OperationError::IllegalState);
        }

        let Some(number) =
            pick_uncalled(self.boards[seat].iter().copied(), |n| self.calls.contains(&n), pick)
        else {
            return OperationResult::Error(OperationError::IllegalState);
        };

        self.calls.push(number);
        let other = 1 - seat;
        if self.progress(seat) >= self.threshold {
            self.winner = Some(seat);
        } else if self.progress(other) >= self.threshold {
            self.winner = Some(other);
        }
        self.holder = other;
        OperationResult::Ok
    }

    /// Completed lines on `seat`'s board, counted from scratch.
    fn progress(&self, seat: usize) -> usize {
        let board = &self.boards[seat];
        let n = self.size;
        let called = |row: usize, col: usize| self.calls.contains(&board[row * n + col]);

        let rows = (0..n).filter(|&r| (0..n).all(|c| called(r, c))).count();
        let cols = (0..n).filter(|&c| (0..n).all(|r| called(r, c))).count();
        let main = usize::from((0..n).all(|i| called(i, i)));
        let anti = usize::from((0..n).all(|i| called(i, n - 1 - i)));
        rows + cols + main + anti
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential() -> Vec<Number> {
        (1..=9).collect()
    }

    #[test]
    fn turns_alternate() {
        let mut model = ModelTable::new([sequential(), sequential()], 3, 3, 0);

        assert!(model.apply(&Operation::Call { seat: 0, pick: 0 }).is_ok());
        assert_eq!(
            model.apply(&Operation::Call { seat: 0, pick: 0 }),
            OperationResult::Error(OperationError::IllegalState)
        );
        assert!(model.apply(&Operation::Call { seat: 1, pick: 0 }).is_ok());
        assert_eq!(model.observable_state().seats[0].ledger, vec![1, 2]);
    }

    #[test]
    fn caller_wins_ties() {
        // Both boards complete row 0 on the third call.
        let mut model = ModelTable::new([sequential(), sequential()], 3, 1, 0);
        for seat in [0, 1, 0] {
            model.apply(&Operation::Call { seat, pick: 0 });
        }

        let state = model.observable_state();
        assert_eq!(state.seats[0].winner, Some(0));
        assert_eq!(state.seats[1].progress, 1);
    }

    #[test]
    fn disconnect_aborts_unfinished_game() {
        let mut model = ModelTable::new([sequential(), sequential()], 3, 3, 1);
        model.apply(&Operation::Disconnect { seat: 0 });

        assert_eq!(
            model.apply(&Operation::Call { seat: 1, pick: 0 }),
            OperationResult::Error(OperationError::PeerLost)
        );
        assert!(model.observable_state().seats.iter().all(|s| s.lost));
    }
}
