//! Turn arbiter.
//!
//! Mirrors, on each peer, which side currently holds the privilege to call a
//! number. Neither peer arbitrates for the other: both apply the same
//! transitions to the same ordered event stream and so agree on the holder.
//!
//! ```text
//! Idle ──ready──▶ WaitingForOpponent ──start──▶ LocalTurn ◀──┐
//!                                        │          │ local  │ opponent
//!                                        │          ▼ call   │ call
//!                                        └──start──▶ OpponentTurn
//!
//! LocalTurn | OpponentTurn ──win──▶ Finished
//! any non-terminal ──peer lost──▶ PeerLost
//! ```

use std::fmt;

use crate::error::SessionError;

/// One side of the session, relative to the local engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    /// The participant this engine belongs to.
    Local,
    /// The other participant.
    Opponent,
}

impl Seat {
    /// The other seat.
    pub fn other(self) -> Self {
        match self {
            Self::Local => Self::Opponent,
            Self::Opponent => Self::Local,
        }
    }
}

/// Session phase and turn possession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnState {
    /// Board being prepared; readiness not yet declared.
    Idle,
    /// Ready-announcement sent; waiting for the start-announcement.
    WaitingForOpponent,
    /// Local participant may call.
    LocalTurn,
    /// Opponent may call.
    OpponentTurn,
    /// A winner has been decided.
    Finished,
    /// The opponent disappeared before a winner was decided.
    PeerLost,
}

impl TurnState {
    /// No transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::PeerLost)
    }

    /// Whether a game is underway.
    pub fn is_playing(self) -> bool {
        matches!(self, Self::LocalTurn | Self::OpponentTurn)
    }

    /// Whether the local engine is waiting on the opponent to act.
    pub fn awaits_peer(self) -> bool {
        matches!(self, Self::WaitingForOpponent | Self::OpponentTurn)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::WaitingForOpponent => "waiting_for_opponent",
            Self::LocalTurn => "local_turn",
            Self::OpponentTurn => "opponent_turn",
            Self::Finished => "finished",
            Self::PeerLost => "peer_lost",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of a session. Set once, never cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionResult {
    /// Local participant won.
    LocalWin,
    /// Opponent won.
    OpponentWin,
}

impl SessionResult {
    /// Result naming `seat` as the winner.
    pub fn won_by(seat: Seat) -> Self {
        match seat {
            Seat::Local => Self::LocalWin,
            Seat::Opponent => Self::OpponentWin,
        }
    }

    /// Winning seat.
    pub fn winner(self) -> Seat {
        match self {
            Self::LocalWin => Seat::Local,
            Self::OpponentWin => Seat::Opponent,
        }
    }
}

/// A state change performed by the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before.
    pub from: TurnState,
    /// State after.
    pub to: TurnState,
}

/// Turn possession state machine.
#[derive(Debug, Clone)]
pub struct TurnArbiter {
    state: TurnState,
    result: Option<SessionResult>,
}

impl Default for TurnArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnArbiter {
    /// Fresh arbiter in `Idle`.
    pub fn new() -> Self {
        Self { state: TurnState::Idle, result: None }
    }

    /// Current state.
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Terminal result, once decided.
    pub fn result(&self) -> Option<SessionResult> {
        self.result
    }

    /// Seat holding the call privilege, if any.
    pub fn holder(&self) -> Option<Seat> {
        match self.state {
            TurnState::LocalTurn => Some(Seat::Local),
            TurnState::OpponentTurn => Some(Seat::Opponent),
            _ => None,
        }
    }

    /// Local participant declared readiness.
    pub fn ready(&mut self) -> Result<Transition, SessionError> {
        self.expect("ready", &[TurnState::Idle])?;
        Ok(self.move_to(TurnState::WaitingForOpponent))
    }

    /// Start-announcement received naming `first` as the opening seat.
    pub fn start(&mut self, first: Seat) -> Result<Transition, SessionError> {
        self.expect("start", &[TurnState::WaitingForOpponent])?;
        Ok(self.move_to(Self::turn_of(first)))
    }

    /// Local participant called a number.
    pub fn local_call(&mut self) -> Result<Transition, SessionError> {
        self.expect("local call", &[TurnState::LocalTurn])?;
        Ok(self.move_to(TurnState::OpponentTurn))
    }

    /// Opponent called a number.
    pub fn opponent_call(&mut self) -> Result<Transition, SessionError> {
        self.expect("opponent call", &[TurnState::OpponentTurn])?;
        Ok(self.move_to(TurnState::LocalTurn))
    }

    /// A winner was decided.
    ///
    /// Allowed from either turn state; the result is recorded exactly once.
    pub fn finish(&mut self, result: SessionResult) -> Result<Transition, SessionError> {
        self.expect("finish", &[TurnState::LocalTurn, TurnState::OpponentTurn])?;
        self.result = Some(result);
        Ok(self.move_to(TurnState::Finished))
    }

    /// The opponent is gone.
    pub fn peer_lost(&mut self) -> Result<Transition, SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::IllegalState { operation: "peer lost", state: self.state });
        }
        Ok(self.move_to(TurnState::PeerLost))
    }

    fn turn_of(seat: Seat) -> TurnState {
        match seat {
            Seat::Local => TurnState::LocalTurn,
            Seat::Opponent => TurnState::OpponentTurn,
        }
    }

    fn expect(&self, operation: &'static str, allowed: &[TurnState]) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::IllegalState { operation, state: self.state })
        }
    }

    fn move_to(&mut self, to: TurnState) -> Transition {
        let from = self.state;
        self.state = to;
        tracing::debug!(%from, %to, "turn transition");
        Transition { from, to }
    }
}
