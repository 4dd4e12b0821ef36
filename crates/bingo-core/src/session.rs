//! Session state machine.
//!
//! The `Session` composes the board, the call ledger, the line evaluator and
//! the turn arbiter behind a single transition function,
//! [`Session::apply`]. It performs no I/O: every effect is returned as a
//! [`SessionAction`] for the caller to execute.
//!
//! # Convergence
//!
//! Two sessions, one per participant, stay in agreement because each applies
//! the same deterministic transitions to the same ordered stream of calls:
//!
//! - The coordinator decides the opening seat once and ships it in `Start`.
//! - A call toggles the turn exactly once per peer: at call time for the
//!   caller, on receipt for the other side. Echoes of one's own call only
//!   touch the ledger.
//! - The caller evaluates its own call first and reports its line count in
//!   the `Call` message. If it reached the threshold it wins; otherwise the
//!   receiver may win on the same number. Both sides read the same `lines`
//!   value, so they pick the same winner.

use bingo_proto::{Message, Number, ParticipantId, SessionId};
use tracing::{debug, info, warn};

use crate::{
    board::Board,
    config::SessionConfig,
    env::Environment,
    error::SessionError,
    event::{SessionAction, SessionEvent},
    ledger::CallLedger,
    lines::{self, LineSet},
    turn::{Seat, SessionResult, Transition, TurnArbiter, TurnState},
};

/// Per-participant session state machine.
///
/// # Type Parameters
///
/// - `E`: Environment implementation for time and randomness
#[derive(Debug, Clone)]
pub struct Session<E: Environment> {
    env: E,
    config: SessionConfig,
    /// Local participant.
    local: ParticipantId,
    /// Session this engine plays in.
    session_id: SessionId,
    /// Opponent, once paired.
    opponent: Option<ParticipantId>,
    /// Opponent's ready-announcement has been seen.
    opponent_ready: bool,
    board: Board,
    ledger: CallLedger,
    /// Completed lines on the local board.
    completed: LineSet,
    /// Opponent's completed line count as reported in its calls.
    opponent_progress: usize,
    arbiter: TurnArbiter,
    /// Last moment the opponent was known to be alive.
    last_peer_activity: Option<E::Instant>,
}

impl<E: Environment> Session<E> {
    /// Create a session for `local` in `session_id`.
    pub fn new(
        env: E,
        config: SessionConfig,
        local: ParticipantId,
        session_id: SessionId,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        if !local.is_valid() {
            return Err(SessionError::Config { reason: "participant id is blank".to_string() });
        }
        if !session_id.is_valid() {
            return Err(SessionError::Config { reason: "session id is blank".to_string() });
        }

        let board = Board::new(config.grid_size);
        Ok(Self {
            env,
            config,
            local,
            session_id,
            opponent: None,
            opponent_ready: false,
            board,
            ledger: CallLedger::new(),
            completed: LineSet::new(),
            opponent_progress: 0,
            arbiter: TurnArbiter::new(),
            last_peer_activity: None,
        })
    }

    /// Fresh session for the same participants: empty board, ledger and
    /// lines, arbiter back in `Idle`.
    #[must_use]
    pub fn reset(&self) -> Self {
        Self {
            env: self.env.clone(),
            config: self.config.clone(),
            local: self.local.clone(),
            session_id: self.session_id.clone(),
            opponent: self.opponent.clone(),
            opponent_ready: false,
            board: Board::new(self.config.grid_size),
            ledger: CallLedger::new(),
            completed: LineSet::new(),
            opponent_progress: 0,
            arbiter: TurnArbiter::new(),
            last_peer_activity: None,
        }
    }

    /// Local participant.
    pub fn local(&self) -> &ParticipantId {
        &self.local
    }

    /// Opponent, once known.
    pub fn opponent(&self) -> Option<&ParticipantId> {
        self.opponent.as_ref()
    }

    /// Whether the opponent has announced readiness.
    pub fn opponent_ready(&self) -> bool {
        self.opponent_ready
    }

    /// Session identifier.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Configuration in effect.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current turn state.
    pub fn state(&self) -> TurnState {
        self.arbiter.state()
    }

    /// Terminal result, once decided.
    pub fn result(&self) -> Option<SessionResult> {
        self.arbiter.result()
    }

    /// Local board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Called numbers, in order.
    pub fn ledger(&self) -> &CallLedger {
        &self.ledger
    }

    /// Lines completed on the local board.
    pub fn completed_lines(&self) -> &LineSet {
        &self.completed
    }

    /// Number of completed local lines.
    pub fn progress_count(&self) -> usize {
        self.completed.len()
    }

    /// Opponent's completed line count.
    pub fn opponent_progress(&self) -> usize {
        self.opponent_progress
    }

    /// Process an event and return resulting actions.
    ///
    /// On error the session is unchanged.
    pub fn apply(
        &mut self,
        event: SessionEvent<E::Instant>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.state() == TurnState::PeerLost {
            return match event {
                SessionEvent::Tick { .. } | SessionEvent::ChannelLost => Ok(vec![]),
                _ => Err(SessionError::PeerLost),
            };
        }

        match event {
            SessionEvent::PlaceNumber { row, col, number } => {
                self.board.place(row, col, number)?;
                Ok(vec![self.board_updated()])
            },
            SessionEvent::AutoFill { pool } => self.handle_auto_fill(&pool),
            SessionEvent::AutoFillShuffled => {
                let pool = Board::shuffled_pool(self.config.grid_size, &self.env);
                self.handle_auto_fill(&pool)
            },
            SessionEvent::OpponentJoined { opponent } => self.handle_opponent_joined(opponent),
            SessionEvent::OpponentLeft => Ok(self.handle_opponent_left()),
            SessionEvent::RequestStart => self.handle_request_start(),
            SessionEvent::CallNumber { number } => self.handle_call_number(number),
            SessionEvent::MessageReceived(message) => self.handle_message(message),
            SessionEvent::ChannelLost => Ok(self.abort("channel lost")),
            SessionEvent::Tick { now } => Ok(self.handle_tick(now)),
        }
    }

    fn handle_auto_fill(&mut self, pool: &[Number]) -> Result<Vec<SessionAction>, SessionError> {
        self.board.auto_fill(pool)?;
        debug!(participant = %self.local, "board auto-filled");
        Ok(vec![self.board_updated()])
    }

    fn handle_opponent_joined(
        &mut self,
        opponent: ParticipantId,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if !opponent.is_valid() || opponent == self.local {
            return Err(SessionError::InvalidMessage {
                reason: format!("{opponent} cannot be our opponent"),
            });
        }

        match &self.opponent {
            Some(current) if *current == opponent => return Ok(vec![]),
            Some(_) if self.state() != TurnState::Idle => {
                return Err(SessionError::IllegalState {
                    operation: "change opponent",
                    state: self.state(),
                });
            },
            _ => {},
        }

        info!(participant = %self.local, %opponent, "opponent joined");
        self.opponent = Some(opponent.clone());
        self.opponent_ready = false;
        self.touch_peer();
        Ok(vec![SessionAction::OpponentChanged { opponent: Some(opponent) }])
    }

    fn handle_opponent_left(&mut self) -> Vec<SessionAction> {
        match self.state() {
            TurnState::Idle => {
                if self.opponent.take().is_none() {
                    return vec![];
                }
                self.opponent_ready = false;
                info!(participant = %self.local, "opponent left before readiness");
                vec![SessionAction::OpponentChanged { opponent: None }]
            },
            state if state.is_terminal() => vec![],
            _ => self.abort("opponent left"),
        }
    }

    fn handle_request_start(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let state = self.state();
        if state != TurnState::Idle {
            return Err(SessionError::IllegalState { operation: "request start", state });
        }
        if !self.board.is_complete() {
            return Err(SessionError::IllegalState {
                operation: "request start with incomplete board",
                state,
            });
        }
        if self.opponent.is_none() {
            return Err(SessionError::IllegalState {
                operation: "request start without opponent",
                state,
            });
        }

        let transition = self.arbiter.ready()?;
        self.board.seal();
        self.touch_peer();

        info!(participant = %self.local, session = %self.session_id, "ready to start");
        Ok(vec![
            state_changed(transition),
            SessionAction::Send(Message::Ready {
                participant: self.local.clone(),
                session: self.session_id.clone(),
            }),
        ])
    }

    fn handle_call_number(&mut self, number: Number) -> Result<Vec<SessionAction>, SessionError> {
        let state = self.state();
        if state != TurnState::LocalTurn {
            return Err(SessionError::IllegalState { operation: "call number", state });
        }
        if !self.board.contains(number) {
            return Err(SessionError::NotOnBoard { number });
        }
        if self.ledger.contains(number) {
            return Err(SessionError::DuplicateCall { number });
        }

        let transition = self.arbiter.local_call()?;
        self.ledger.record(number, Seat::Local);
        self.touch_peer();

        let mut actions =
            vec![SessionAction::NumberCalled { number, by: Seat::Local, on_board: true }];
        self.evaluate_lines(&mut actions);

        debug!(participant = %self.local, number, progress = self.progress_count(), "called number");
        actions.push(SessionAction::Send(Message::Call {
            participant: self.local.clone(),
            session: self.session_id.clone(),
            number,
            lines: wire_lines(self.progress_count()),
        }));
        actions.push(state_changed(transition));

        if self.progress_count() >= self.config.win_threshold {
            self.declare_local_win(&mut actions);
        }

        Ok(actions)
    }

    fn handle_message(&mut self, message: Message) -> Result<Vec<SessionAction>, SessionError> {
        message.validate()?;

        if *message.session() != self.session_id {
            warn!(expected = %self.session_id, got = %message.session(), "message for another session");
            return Err(SessionError::InvalidMessage {
                reason: format!("message for session {}", message.session()),
            });
        }

        match message {
            Message::Join { .. } => Err(SessionError::InvalidMessage {
                reason: "join is addressed to the coordinator".to_string(),
            }),
            Message::Members { participants, .. } => self.handle_members(participants),
            Message::Ready { participant, .. } => self.handle_ready(&participant),
            Message::Start { first_turn, .. } => self.handle_start(&first_turn),
            Message::Call { participant, number, lines, .. } => {
                self.handle_inbound_call(&participant, number, usize::from(lines))
            },
            Message::Win { participant, .. } => self.handle_win(&participant),
            Message::Left { participant, .. } => {
                if self.opponent.as_ref() == Some(&participant) {
                    Ok(self.handle_opponent_left())
                } else {
                    Err(self.unknown_participant(&participant))
                }
            },
        }
    }

    fn handle_members(
        &mut self,
        participants: Vec<ParticipantId>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if !participants.contains(&self.local) {
            return Err(SessionError::InvalidMessage {
                reason: format!("membership does not include {}", self.local),
            });
        }
        if participants.len() > 2 {
            return Err(SessionError::InvalidMessage {
                reason: format!("{} participants in a two-player session", participants.len()),
            });
        }

        // Departures arrive as `Left`; a list without the opponent is stale.
        match participants.into_iter().find(|p| *p != self.local) {
            Some(opponent) => self.handle_opponent_joined(opponent),
            None => Ok(vec![]),
        }
    }

    fn handle_ready(&mut self, participant: &ParticipantId) -> Result<Vec<SessionAction>, SessionError> {
        if *participant == self.local {
            return Ok(vec![]);
        }
        if self.opponent.as_ref() != Some(participant) {
            return Err(self.unknown_participant(participant));
        }

        self.touch_peer();
        if self.opponent_ready {
            return Ok(vec![]);
        }

        debug!(participant = %self.local, opponent = %participant, "opponent ready");
        self.opponent_ready = true;
        Ok(vec![SessionAction::OpponentReady])
    }

    fn handle_start(&mut self, first_turn: &ParticipantId) -> Result<Vec<SessionAction>, SessionError> {
        let state = self.state();
        match state {
            TurnState::WaitingForOpponent => {},
            TurnState::Idle => {
                return Err(SessionError::IllegalState { operation: "start", state });
            },
            _ => {
                debug!(participant = %self.local, %state, "duplicate start ignored");
                return Ok(vec![]);
            },
        }

        let first = if *first_turn == self.local {
            Seat::Local
        } else if self.opponent.as_ref() == Some(first_turn) {
            Seat::Opponent
        } else {
            return Err(self.unknown_participant(first_turn));
        };

        let transition = self.arbiter.start(first)?;
        self.opponent_ready = true;
        self.touch_peer();

        info!(participant = %self.local, session = %self.session_id, %first_turn, "session started");
        Ok(vec![state_changed(transition)])
    }

    fn handle_inbound_call(
        &mut self,
        participant: &ParticipantId,
        number: Number,
        caller_lines: usize,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if usize::from(number) > self.config.max_number() {
            return Err(SessionError::InvalidMessage {
                reason: format!("number {number} is outside 1..={}", self.config.max_number()),
            });
        }

        if *participant == self.local {
            return self.handle_echo(number);
        }
        if self.opponent.as_ref() != Some(participant) {
            return Err(self.unknown_participant(participant));
        }
        if self.ledger.contains(number) {
            debug!(participant = %self.local, number, "duplicate call ignored");
            return Err(SessionError::DuplicateCall { number });
        }

        let state = self.state();
        match state {
            TurnState::OpponentTurn => {},
            TurnState::LocalTurn => {
                warn!(participant = %self.local, opponent = %participant, number, "opponent called out of turn");
                return Err(SessionError::OutOfTurn { participant: participant.clone() });
            },
            _ => return Err(SessionError::IllegalState { operation: "opponent call", state }),
        }

        let transition = self.arbiter.opponent_call()?;
        self.ledger.record(number, Seat::Opponent);
        self.touch_peer();

        let mut actions = vec![SessionAction::NumberCalled {
            number,
            by: Seat::Opponent,
            on_board: self.board.contains(number),
        }];
        self.evaluate_lines(&mut actions);

        if caller_lines > self.opponent_progress {
            self.opponent_progress = caller_lines;
            actions.push(SessionAction::OpponentProgress { progress: caller_lines });
        }
        actions.push(state_changed(transition));

        debug!(participant = %self.local, number, progress = self.progress_count(), "opponent called");

        // The caller evaluated first, so its claim takes precedence.
        if self.opponent_progress >= self.config.win_threshold {
            self.finish(SessionResult::OpponentWin, &mut actions);
        } else if self.progress_count() >= self.config.win_threshold {
            self.declare_local_win(&mut actions);
        }

        Ok(actions)
    }

    /// Our own call relayed back by the channel.
    ///
    /// The caller records its number at call time, so an echo never changes
    /// anything. Echoes still in flight from a previous game arrive before the
    /// next `Start` and are dropped.
    fn handle_echo(&mut self, number: Number) -> Result<Vec<SessionAction>, SessionError> {
        let state = self.state();
        if !state.is_playing() && state != TurnState::Finished {
            debug!(participant = %self.local, number, %state, "stale echo ignored");
            return Ok(vec![]);
        }
        if !self.ledger.contains(number) {
            warn!(participant = %self.local, number, "echo for a number never called");
            return Err(SessionError::InvalidMessage {
                reason: format!("echo of {number} which was never called locally"),
            });
        }
        Ok(vec![])
    }

    fn handle_win(&mut self, participant: &ParticipantId) -> Result<Vec<SessionAction>, SessionError> {
        if *participant == self.local {
            return Ok(vec![]);
        }
        if self.opponent.as_ref() != Some(participant) {
            return Err(self.unknown_participant(participant));
        }

        self.touch_peer();
        match (self.state(), self.result()) {
            (TurnState::Finished, Some(SessionResult::OpponentWin)) => Ok(vec![]),
            (TurnState::Finished, _) => {
                warn!(participant = %self.local, opponent = %participant, "conflicting win claim");
                Err(SessionError::InvalidMessage {
                    reason: format!("{participant} claims a win already decided for us"),
                })
            },
            (state, _) if state.is_playing() => {
                let mut actions = Vec::new();
                self.finish(SessionResult::OpponentWin, &mut actions);
                Ok(actions)
            },
            (state, _) => Err(SessionError::IllegalState { operation: "opponent win", state }),
        }
    }

    fn handle_tick(&mut self, now: E::Instant) -> Vec<SessionAction> {
        let Some(timeout) = self.config.peer_timeout else {
            return vec![];
        };
        if !self.state().awaits_peer() {
            return vec![];
        }
        let Some(last) = self.last_peer_activity else {
            return vec![];
        };

        if now > last && now - last >= timeout {
            return self.abort(&format!("opponent silent for {}s", timeout.as_secs()));
        }
        vec![]
    }

    /// Evaluate the board against the ledger and fold in new lines.
    fn evaluate_lines(&mut self, actions: &mut Vec<SessionAction>) {
        let new = lines::evaluate(&self.board, &self.ledger, &self.completed);
        if new.is_empty() {
            return;
        }

        self.completed.extend(new.iter().copied());
        debug!(participant = %self.local, progress = self.completed.len(), "lines completed");
        actions.push(SessionAction::LinesCompleted { lines: new, progress: self.completed.len() });
    }

    fn declare_local_win(&mut self, actions: &mut Vec<SessionAction>) {
        self.finish(SessionResult::LocalWin, actions);
        if self.result() == Some(SessionResult::LocalWin) {
            actions.push(SessionAction::Send(Message::Win {
                participant: self.local.clone(),
                session: self.session_id.clone(),
            }));
        }
    }

    fn finish(&mut self, result: SessionResult, actions: &mut Vec<SessionAction>) {
        match self.arbiter.finish(result) {
            Ok(transition) => {
                info!(participant = %self.local, session = %self.session_id, ?result, "session finished");
                actions.push(state_changed(transition));
                actions.push(SessionAction::SessionEnded { result });
            },
            Err(e) => warn!(participant = %self.local, error = %e, "finish rejected"),
        }
    }

    fn abort(&mut self, reason: &str) -> Vec<SessionAction> {
        match self.arbiter.peer_lost() {
            Ok(transition) => {
                info!(participant = %self.local, session = %self.session_id, reason, "session aborted");
                vec![
                    state_changed(transition),
                    SessionAction::SessionAborted { reason: reason.to_string() },
                ]
            },
            Err(_) => vec![],
        }
    }

    fn touch_peer(&mut self) {
        self.last_peer_activity = Some(self.env.now());
    }

    fn board_updated(&self) -> SessionAction {
        SessionAction::BoardUpdated {
            filled: self.board.filled(),
            complete: self.board.is_complete(),
        }
    }

    fn unknown_participant(&self, participant: &ParticipantId) -> SessionError {
        warn!(participant = %self.local, sender = %participant, "message from unknown participant");
        SessionError::InvalidMessage { reason: format!("unknown participant {participant}") }
    }
}

fn state_changed(transition: Transition) -> SessionAction {
    SessionAction::StateChanged { from: transition.from, to: transition.to }
}

fn wire_lines(progress: usize) -> u8 {
    u8::try_from(progress).unwrap_or(u8::MAX)
}
