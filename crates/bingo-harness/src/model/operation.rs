//! Operations for model-based testing.
//!
//! Operations represent everything that can happen to a running table. They
//! are generated randomly (proptest, or `arbitrary` in the fuzzer) and applied
//! to both the model and the simulated system.

use arbitrary::Arbitrary;
use bingo_proto::Number;

/// Seat index. Reduced modulo two when applied.
pub type SeatId = u8;

/// Operations that can be applied to a started table.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// A player calls a number from their board.
    Call {
        /// Calling seat.
        seat: SeatId,
        /// Which uncalled number to pick, row-major, modulo the count.
        pick: u8,
    },

    /// The channel re-delivers a message the seat already received.
    Replay {
        /// Receiving seat.
        seat: SeatId,
        /// Which earlier message, modulo the history length.
        pick: u8,
    },

    /// Advance simulation time and tick both engines.
    AdvanceTime {
        /// Seconds to advance.
        secs: u8,
    },

    /// A player's connection drops.
    Disconnect {
        /// Disconnecting seat.
        seat: SeatId,
    },
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation took effect (or was a no-op by nature).
    Ok,

    /// Operation was refused.
    Error(OperationError),
}

/// Expected refusals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Not this seat's turn, or the game is over.
    IllegalState,

    /// The session was abandoned.
    PeerLost,
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Number a `Call { pick }` resolves to: the `pick`-th uncalled value of
/// `board` in row-major order, wrapping around.
pub fn pick_uncalled(
    board: impl IntoIterator<Item = Number>,
    is_called: impl Fn(Number) -> bool,
    pick: u8,
) -> Option<Number> {
    let open: Vec<Number> = board.into_iter().filter(|&n| !is_called(n)).collect();
    if open.is_empty() {
        return None;
    }
    Some(open[usize::from(pick) % open.len()])
}
