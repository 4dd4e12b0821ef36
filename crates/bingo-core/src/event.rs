//! Session events and actions.
//!
//! Events are everything that can happen to a session: local user intents,
//! inbound messages, channel loss and clock ticks. Actions are what the
//! caller must do in response: send messages, or notify the presentation
//! layer.

use bingo_proto::{Message, Number, ParticipantId};

use crate::{
    lines::LineSet,
    turn::{SessionResult, Seat, TurnState},
};

/// Input to [`Session::apply`](crate::Session::apply).
///
/// Generic over the environment's instant type so ticks can carry virtual
/// time in simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent<I> {
    /// Place a number on the local board.
    PlaceNumber {
        /// Target row.
        row: usize,
        /// Target column.
        col: usize,
        /// Number to place.
        number: Number,
    },

    /// Fill the local board row-major from a full permutation of `1..=N²`.
    AutoFill {
        /// Permutation to lay out.
        pool: Vec<Number>,
    },

    /// Fill the local board with a permutation drawn from the environment.
    AutoFillShuffled,

    /// The coordinator paired us with an opponent.
    OpponentJoined {
        /// Opponent identity.
        opponent: ParticipantId,
    },

    /// The opponent left before or during the game.
    OpponentLeft,

    /// Local participant asks to start.
    RequestStart,

    /// Local participant calls a number.
    CallNumber {
        /// Number to call.
        number: Number,
    },

    /// A message arrived on the channel.
    MessageReceived(Message),

    /// The channel reported disconnection.
    ChannelLost,

    /// Time has passed.
    Tick {
        /// Current time.
        now: I,
    },
}

/// Output of [`Session::apply`](crate::Session::apply), executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send a message on the channel.
    Send(Message),

    /// Turn state changed.
    StateChanged {
        /// Previous state.
        from: TurnState,
        /// New state.
        to: TurnState,
    },

    /// Local board changed.
    BoardUpdated {
        /// Filled cell count.
        filled: usize,
        /// Whether every cell is filled.
        complete: bool,
    },

    /// Opponent identity became known or was cleared.
    OpponentChanged {
        /// Current opponent.
        opponent: Option<ParticipantId>,
    },

    /// Opponent announced readiness.
    OpponentReady,

    /// A number entered the ledger.
    NumberCalled {
        /// Called number.
        number: Number,
        /// Who called it.
        by: Seat,
        /// Whether the number is on the local board.
        on_board: bool,
    },

    /// Lines on the local board were completed.
    LinesCompleted {
        /// Newly completed lines.
        lines: LineSet,
        /// Total completed lines.
        progress: usize,
    },

    /// Opponent's completed line count changed.
    OpponentProgress {
        /// Opponent's total completed lines.
        progress: usize,
    },

    /// A winner was decided.
    SessionEnded {
        /// Outcome.
        result: SessionResult,
    },

    /// The session was abandoned because the opponent is gone.
    SessionAborted {
        /// Human-readable cause.
        reason: String,
    },
}

impl SessionAction {
    /// The message to send, if this is a send action.
    pub fn as_send(&self) -> Option<&Message> {
        match self {
            Self::Send(message) => Some(message),
            _ => None,
        }
    }
}
