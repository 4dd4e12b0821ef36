//! Session error types.
//!
//! Every failure leaves the session exactly as it was before the operation.
//! Callers branch on [`SessionError::kind`] rather than on individual
//! variants.

use bingo_proto::{Number, ParticipantId};
use thiserror::Error;

use crate::turn::TurnState;

/// Why a board placement was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// Row or column outside the grid.
    #[error("cell ({row}, {col}) is outside a {size}x{size} board")]
    OutOfBounds {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
        /// Board edge length.
        size: usize,
    },

    /// Value outside `1..=N²`.
    #[error("value {value} is outside 1..={max}")]
    ValueOutOfRange {
        /// Rejected value.
        value: Number,
        /// Largest allowed value.
        max: usize,
    },

    /// Target cell already holds a value.
    #[error("cell ({row}, {col}) is already occupied")]
    CellOccupied {
        /// Occupied row.
        row: usize,
        /// Occupied column.
        col: usize,
    },

    /// Value already placed elsewhere on this board.
    #[error("value {value} is already placed at ({row}, {col})")]
    ValueAlreadyPlaced {
        /// Duplicate value.
        value: Number,
        /// Row where it already sits.
        row: usize,
        /// Column where it already sits.
        col: usize,
    },

    /// Board was sealed when the participant declared readiness.
    #[error("board is sealed")]
    Sealed,

    /// Auto-fill pool is not a permutation of `1..=N²`.
    #[error("invalid fill pool: {reason}")]
    InvalidPool {
        /// What is wrong with the pool.
        reason: String,
    },
}

/// Classified failure condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation attempted outside its valid phase. Recovered locally.
    IllegalState,
    /// Number already in the ledger. Silently ignored.
    DuplicateCall,
    /// Board placement rejected.
    InvalidPlacement,
    /// Inbound message is malformed or contradicts the protocol.
    InvalidMessage,
    /// The opponent is gone; the session is aborted.
    PeerLost,
}

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Operation is not valid in the current turn state.
    #[error("{operation} not allowed in state {state}")]
    IllegalState {
        /// Attempted operation.
        operation: &'static str,
        /// State the session was in.
        state: TurnState,
    },

    /// Number has already been called this session.
    #[error("number {number} already called")]
    DuplicateCall {
        /// Duplicate number.
        number: Number,
    },

    /// Board rejected a placement.
    #[error("invalid placement: {0}")]
    InvalidPlacement(#[from] PlacementError),

    /// Local call for a number that is not on the local board.
    #[error("number {number} is not on the board")]
    NotOnBoard {
        /// Requested number.
        number: Number,
    },

    /// Inbound message failed validation.
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// Why the message was rejected.
        reason: String,
    },

    /// Opponent called while the turn privilege was held locally.
    #[error("{participant} called out of turn")]
    OutOfTurn {
        /// Offending participant.
        participant: ParticipantId,
    },

    /// Session was aborted because the opponent disappeared.
    #[error("peer lost")]
    PeerLost,

    /// Configuration is not playable.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What is wrong with the configuration.
        reason: String,
    },
}

impl SessionError {
    /// Map onto the classified failure conditions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IllegalState { .. } | Self::NotOnBoard { .. } | Self::Config { .. } => {
                ErrorKind::IllegalState
            },
            Self::DuplicateCall { .. } => ErrorKind::DuplicateCall,
            Self::InvalidPlacement(_) => ErrorKind::InvalidPlacement,
            Self::InvalidMessage { .. } | Self::OutOfTurn { .. } => ErrorKind::InvalidMessage,
            Self::PeerLost => ErrorKind::PeerLost,
        }
    }

    /// Returns true if the condition should not be surfaced to the user.
    ///
    /// Duplicates arise from replays and echoes and carry no information.
    pub fn is_silent(&self) -> bool {
        matches!(self.kind(), ErrorKind::DuplicateCall)
    }
}

impl From<bingo_proto::ProtoError> for SessionError {
    fn from(err: bingo_proto::ProtoError) -> Self {
        Self::InvalidMessage { reason: err.to_string() }
    }
}

/// Errors reported by a [`Channel`](crate::Channel) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel was closed by either side.
    #[error("channel closed")]
    Closed,

    /// Underlying transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_call_is_silent() {
        let err = SessionError::DuplicateCall { number: 7 };
        assert!(err.is_silent());
        assert_eq!(err.kind(), ErrorKind::DuplicateCall);
    }

    #[test]
    fn placement_maps_to_invalid_placement() {
        let err = SessionError::from(PlacementError::Sealed);
        assert_eq!(err.kind(), ErrorKind::InvalidPlacement);
        assert!(!err.is_silent());
    }

    #[test]
    fn out_of_turn_is_invalid_message() {
        let err = SessionError::OutOfTurn { participant: "bob".into() };
        assert_eq!(err.kind(), ErrorKind::InvalidMessage);
        assert_eq!(err.to_string(), "bob called out of turn");
    }

    #[test]
    fn illegal_state_display() {
        let err = SessionError::IllegalState { operation: "call", state: TurnState::Idle };
        assert_eq!(err.to_string(), "call not allowed in state idle");
    }
}
