//! Session engine.
//!
//! Thin driver around [`Session`]: feeds it events, sends its messages on an
//! injected [`Channel`] and forwards every other action to registered
//! [`SessionObserver`]s. All game logic stays in the session; the engine only
//! executes what the session returns.

use std::collections::VecDeque;

use bingo_proto::{Message, Number, ParticipantId, SessionId};
use tracing::{debug, warn};

use crate::{
    board::Board,
    config::SessionConfig,
    env::Environment,
    error::{ChannelError, SessionError},
    event::{SessionAction, SessionEvent},
    ledger::CallLedger,
    lines::LineSet,
    session::Session,
    turn::{SessionResult, TurnState},
};

/// Outbound half of the message channel.
///
/// Delivery must preserve send order.
pub trait Channel {
    /// Send a message to the opponent via the coordinator.
    fn send(&mut self, message: &Message) -> Result<(), ChannelError>;
}

/// Receives every non-send action the engine executes, in order.
pub trait SessionObserver {
    /// Called once per action.
    fn on_action(&mut self, action: &SessionAction);
}

impl<F: FnMut(&SessionAction)> SessionObserver for F {
    fn on_action(&mut self, action: &SessionAction) {
        self(action);
    }
}

/// Drives a [`Session`] against a channel and a set of observers.
///
/// # Type Parameters
///
/// - `C`: Channel used for outbound messages
/// - `E`: Environment implementation for time and randomness
pub struct SessionEngine<C: Channel, E: Environment> {
    session: Session<E>,
    channel: C,
    observers: Vec<Box<dyn SessionObserver>>,
    /// Set once a send has failed; later sends are dropped.
    channel_lost: bool,
}

impl<C: Channel, E: Environment> SessionEngine<C, E> {
    /// Create an engine for `local` in `session_id`, sending on `channel`.
    pub fn new(
        env: E,
        config: SessionConfig,
        local: ParticipantId,
        session_id: SessionId,
        channel: C,
    ) -> Result<Self, SessionError> {
        let session = Session::new(env, config, local, session_id)?;
        Ok(Self { session, channel, observers: Vec::new(), channel_lost: false })
    }

    /// Register an observer. Observers are notified in registration order.
    pub fn add_observer(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Place a number on the local board.
    pub fn place(&mut self, row: usize, col: usize, number: Number) -> Result<(), SessionError> {
        self.dispatch(SessionEvent::PlaceNumber { row, col, number })
    }

    /// Fill the board from a permutation of `1..=N²`.
    pub fn auto_fill(&mut self, pool: Vec<Number>) -> Result<(), SessionError> {
        self.dispatch(SessionEvent::AutoFill { pool })
    }

    /// Fill the board with a shuffled permutation.
    pub fn auto_fill_shuffled(&mut self) -> Result<(), SessionError> {
        self.dispatch(SessionEvent::AutoFillShuffled)
    }

    /// Record the opponent's identity.
    pub fn set_opponent(&mut self, opponent: ParticipantId) -> Result<(), SessionError> {
        self.dispatch(SessionEvent::OpponentJoined { opponent })
    }

    /// Declare readiness. Requires a complete board and a known opponent.
    pub fn request_start(&mut self) -> Result<(), SessionError> {
        self.dispatch(SessionEvent::RequestStart)
    }

    /// Call a number from the local board.
    pub fn call_number(&mut self, number: Number) -> Result<(), SessionError> {
        self.dispatch(SessionEvent::CallNumber { number })
    }

    /// Process a message delivered by the channel.
    pub fn on_inbound_message(&mut self, message: Message) -> Result<(), SessionError> {
        self.dispatch(SessionEvent::MessageReceived(message))
    }

    /// The channel reported disconnection.
    pub fn on_channel_lost(&mut self) {
        self.channel_lost = true;
        if let Err(e) = self.dispatch(SessionEvent::ChannelLost) {
            debug!(participant = %self.session.local(), error = %e, "channel loss rejected");
        }
    }

    /// Advance time for liveness detection.
    pub fn tick(&mut self, now: E::Instant) {
        if let Err(e) = self.dispatch(SessionEvent::Tick { now }) {
            debug!(participant = %self.session.local(), error = %e, "tick rejected");
        }
    }

    /// Start over with the same participants ("play again").
    ///
    /// A lost channel stays lost: the fresh session starts out in
    /// [`TurnState::PeerLost`].
    pub fn reset(&mut self) {
        debug!(participant = %self.session.local(), "session reset");
        self.session = self.session.reset();

        if self.channel_lost {
            warn!(participant = %self.session.local(), "reset on a lost channel");
            if let Ok(lost) = self.session.apply(SessionEvent::ChannelLost) {
                self.execute(lost);
            }
        }
    }

    /// Underlying session.
    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    /// Current turn state.
    pub fn turn_state(&self) -> TurnState {
        self.session.state()
    }

    /// Number of completed local lines.
    pub fn progress_count(&self) -> usize {
        self.session.progress_count()
    }

    /// Opponent's reported line count.
    pub fn opponent_progress(&self) -> usize {
        self.session.opponent_progress()
    }

    /// Terminal result, once decided.
    pub fn result(&self) -> Option<SessionResult> {
        self.session.result()
    }

    /// Call ledger.
    pub fn called_numbers(&self) -> &CallLedger {
        self.session.ledger()
    }

    /// Completed local lines.
    pub fn completed_lines(&self) -> &LineSet {
        self.session.completed_lines()
    }

    /// Local board.
    pub fn board(&self) -> &Board {
        self.session.board()
    }

    /// Injected channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Injected channel, mutably.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    fn dispatch(&mut self, event: SessionEvent<E::Instant>) -> Result<(), SessionError> {
        let actions = self.session.apply(event)?;
        self.execute(actions);
        Ok(())
    }

    fn execute(&mut self, actions: Vec<SessionAction>) {
        let mut pending = VecDeque::from(actions);

        while let Some(action) = pending.pop_front() {
            let SessionAction::Send(message) = &action else {
                for observer in &mut self.observers {
                    observer.on_action(&action);
                }
                continue;
            };

            if self.channel_lost {
                debug!(kind = %message.kind(), "channel lost, dropping outbound message");
                continue;
            }

            if let Err(e) = self.channel.send(message) {
                warn!(participant = %self.session.local(), error = %e, "send failed");
                self.channel_lost = true;
                if let Ok(lost) = self.session.apply(SessionEvent::ChannelLost) {
                    pending.extend(lost);
                }
            }
        }
    }
}

impl<C: Channel, E: Environment> std::fmt::Debug for SessionEngine<C, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("local", self.session.local())
            .field("state", &self.session.state())
            .field("observers", &self.observers.len())
            .field("channel_lost", &self.channel_lost)
            .finish_non_exhaustive()
    }
}
