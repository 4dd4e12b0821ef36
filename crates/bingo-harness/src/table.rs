//! Simulated table.
//!
//! Two `SessionEngine`s wired through a real `RoomManager` with in-memory
//! channels. Delivery is FIFO per recipient and runs to quiescence after every
//! step. Optional faults re-deliver messages to exercise idempotence.

use std::{cell::RefCell, collections::VecDeque, rc::Rc, time::Duration};

use bingo_core::{
    Environment, SessionAction, SessionConfig, SessionEngine, SessionError, SessionResult,
    TurnState,
};
use bingo_proto::{Message, Number, ParticipantId, SessionId};
use bingo_server::{ConnectionId, CoordinatorConfig, RoomAction, RoomError, RoomManager};

use crate::{
    model::{ObservableState, Operation, OperationError, OperationResult, SeatView, pick_uncalled},
    sim_channel::SimChannel,
    sim_env::SimEnv,
};

/// Fault injection settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultConfig {
    /// Probability that a delivered message is delivered a second time.
    pub duplicate_rate: f64,
}

struct SimSeat {
    engine: SessionEngine<SimChannel, SimEnv>,
    channel: SimChannel,
    conn: ConnectionId,
    participant: ParticipantId,
    /// Every message delivered to this seat, for replays.
    received: Vec<Message>,
    /// Every non-send action the engine executed.
    notifications: Rc<RefCell<Vec<SessionAction>>>,
    connected: bool,
}

/// Two peers and a coordinator in one deterministic simulation.
pub struct SimTable {
    env: SimEnv,
    faults: FaultConfig,
    session: SessionId,
    coordinator: RoomManager<SimEnv>,
    seats: [SimSeat; 2],
    /// Coordinator output not yet handed to an engine.
    inflight: VecDeque<(usize, Message)>,
    /// Engine errors raised by deliveries, excluding silent duplicates.
    delivery_errors: Vec<(usize, SessionError)>,
    /// Coordinator refusals.
    coordinator_errors: Vec<(usize, RoomError)>,
}

impl SimTable {
    /// Create a table with boards filled from `pools`. Nobody has joined yet.
    pub fn new(
        seed: u64,
        config: SessionConfig,
        pools: [Vec<Number>; 2],
    ) -> Result<Self, SessionError> {
        let env = SimEnv::with_seed(seed);
        let session = SessionId::from("table");
        let coordinator = RoomManager::new(env.clone(), CoordinatorConfig::default());

        let [pool0, pool1] = pools;
        let seats = [
            Self::seat(&env, &config, &session, 0, pool0)?,
            Self::seat(&env, &config, &session, 1, pool1)?,
        ];

        Ok(Self {
            env,
            faults: FaultConfig::default(),
            session,
            coordinator,
            seats,
            inflight: VecDeque::new(),
            delivery_errors: Vec::new(),
            coordinator_errors: Vec::new(),
        })
    }

    fn seat(
        env: &SimEnv,
        config: &SessionConfig,
        session: &SessionId,
        idx: usize,
        pool: Vec<Number>,
    ) -> Result<SimSeat, SessionError> {
        let participant = ParticipantId::new(format!("p{idx}"));
        let channel = SimChannel::new();
        let mut engine = SessionEngine::new(
            env.clone(),
            config.clone(),
            participant.clone(),
            session.clone(),
            channel.clone(),
        )?;

        let notifications = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&notifications);
        engine.add_observer(move |action: &SessionAction| sink.borrow_mut().push(action.clone()));
        engine.auto_fill(pool)?;

        Ok(SimSeat {
            engine,
            channel,
            conn: idx as ConnectionId + 1,
            participant,
            received: Vec::new(),
            notifications,
            connected: true,
        })
    }

    /// Enable fault injection.
    #[must_use]
    pub fn with_faults(mut self, faults: FaultConfig) -> Self {
        self.faults = faults;
        self
    }

    /// Join both seats, declare readiness and return the seat holding the
    /// opening turn.
    pub fn start(&mut self) -> Result<usize, SessionError> {
        for seat in 0..2 {
            let join = Message::Join {
                participant: self.seats[seat].participant.clone(),
                session: self.session.clone(),
            };
            self.route(seat, join);
        }
        self.deliver_pending();
        self.ready_up()
    }

    /// Reset both engines for another round on the same pairing, refill the
    /// boards from `pools` and start again.
    pub fn rematch(&mut self, pools: [Vec<Number>; 2]) -> Result<usize, SessionError> {
        for (seat, pool) in self.seats.iter_mut().zip(pools) {
            seat.engine.reset();
            seat.engine.auto_fill(pool)?;
            seat.received.clear();
        }
        self.ready_up()
    }

    fn ready_up(&mut self) -> Result<usize, SessionError> {
        for seat in 0..2 {
            self.seats[seat].engine.request_start()?;
        }
        self.deliver_pending();

        self.seats
            .iter()
            .position(|s| s.engine.turn_state() == TurnState::LocalTurn)
            .ok_or(SessionError::IllegalState {
                operation: "start table",
                state: self.seats[0].engine.turn_state(),
            })
    }

    /// Apply a model operation to the simulated system.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Call { seat, pick } => {
                let seat = usize::from(*seat) % 2;
                let Some(number) = self.pick(seat, *pick) else {
                    return OperationResult::Error(OperationError::IllegalState);
                };
                match self.call(seat, number) {
                    Ok(()) => OperationResult::Ok,
                    Err(SessionError::PeerLost) => OperationResult::Error(OperationError::PeerLost),
                    Err(_) => OperationResult::Error(OperationError::IllegalState),
                }
            },
            Operation::Replay { seat, pick } => {
                self.replay(usize::from(*seat) % 2, usize::from(*pick));
                OperationResult::Ok
            },
            Operation::AdvanceTime { secs } => {
                self.advance(Duration::from_secs(u64::from(*secs)));
                OperationResult::Ok
            },
            Operation::Disconnect { seat } => {
                self.disconnect(usize::from(*seat) % 2);
                OperationResult::Ok
            },
        }
    }

    /// `seat` calls `number`; delivery runs to quiescence.
    pub fn call(&mut self, seat: usize, number: Number) -> Result<(), SessionError> {
        self.seats[seat].engine.call_number(number)?;
        self.deliver_pending();
        Ok(())
    }

    /// `seat` calls `number` and the coordinator relays it, but nothing is
    /// delivered to either engine until the next [`Self::deliver_pending`].
    pub fn call_in_flight(&mut self, seat: usize, number: Number) -> Result<(), SessionError> {
        self.seats[seat].engine.call_number(number)?;
        for message in self.seats[seat].channel.drain() {
            self.route(seat, message);
        }
        Ok(())
    }

    /// Re-deliver the `pick`-th message `seat` has received.
    pub fn replay(&mut self, seat: usize, pick: usize) {
        let received = &self.seats[seat].received;
        if received.is_empty() {
            return;
        }
        let message = received[pick % received.len()].clone();
        tracing::trace!(seat, kind = %message.kind(), "replaying message");
        let _ = self.seats[seat].engine.on_inbound_message(message);
        self.deliver_pending();
    }

    /// Advance the virtual clock and tick both engines.
    pub fn advance(&mut self, by: Duration) {
        self.env.advance(by);
        let now = self.env.now();
        for seat in &mut self.seats {
            seat.engine.tick(now);
        }
        self.deliver_pending();
    }

    /// Drop `seat`'s connection.
    pub fn disconnect(&mut self, seat: usize) {
        let s = &mut self.seats[seat];
        if !s.connected {
            return;
        }
        s.connected = false;
        s.channel.close();
        s.engine.on_channel_lost();

        let conn = s.conn;
        let actions = self.coordinator.disconnect(conn);
        self.enqueue(actions);
        self.deliver_pending();
    }

    /// Send a raw message from `seat`'s connection, bypassing its engine.
    pub fn inject(&mut self, seat: usize, message: Message) {
        self.route(seat, message);
        self.deliver_pending();
    }

    /// Route queued output through the coordinator until nothing moves.
    pub fn deliver_pending(&mut self) {
        loop {
            let mut progressed = false;

            for seat in 0..2 {
                for message in self.seats[seat].channel.drain() {
                    progressed = true;
                    self.route(seat, message);
                }
            }

            while let Some((seat, message)) = self.inflight.pop_front() {
                progressed = true;
                self.deliver(seat, message);
            }

            if !progressed {
                return;
            }
        }
    }

    fn route(&mut self, seat: usize, message: Message) {
        let conn = self.seats[seat].conn;
        match self.coordinator.handle(conn, message) {
            Ok(actions) => self.enqueue(actions),
            Err(e) => {
                tracing::debug!(seat, error = %e, "coordinator refused message");
                self.coordinator_errors.push((seat, e));
            },
        }
    }

    fn enqueue(&mut self, actions: Vec<RoomAction>) {
        for RoomAction::Send { conn, message } in actions {
            if let Some(seat) = self.seats.iter().position(|s| s.conn == conn) {
                self.inflight.push_back((seat, message));
            }
        }
    }

    fn deliver(&mut self, seat: usize, message: Message) {
        let duplicate = self.env.chance(self.faults.duplicate_rate);
        let s = &mut self.seats[seat];
        if !s.connected {
            return;
        }

        s.received.push(message.clone());
        let copies = if duplicate { 2 } else { 1 };
        for _ in 0..copies {
            if let Err(e) = s.engine.on_inbound_message(message.clone()) {
                if !e.is_silent() {
                    tracing::debug!(seat, error = %e, "delivery rejected");
                    self.delivery_errors.push((seat, e));
                }
            }
        }
    }

    /// Number `Call { pick }` resolves to for `seat`.
    pub fn pick(&self, seat: usize, pick: u8) -> Option<Number> {
        let engine = &self.seats[seat].engine;
        let board = engine.board();
        let size = board.size();
        let cells = (0..size * size).filter_map(|i| board.get(i / size, i % size));
        pick_uncalled(cells, |n| engine.called_numbers().contains(n), pick)
    }

    /// Extract observable state for comparison with the model.
    pub fn observable_state(&self) -> ObservableState {
        let view = |seat: usize| {
            let engine = &self.seats[seat].engine;
            SeatView {
                ledger: engine.called_numbers().numbers().collect(),
                progress: engine.progress_count(),
                winner: engine.result().map(|r| match r {
                    SessionResult::LocalWin => seat,
                    SessionResult::OpponentWin => 1 - seat,
                }),
                holds_turn: engine.turn_state() == TurnState::LocalTurn,
                lost: engine.turn_state() == TurnState::PeerLost,
            }
        };
        ObservableState { seats: [view(0), view(1)] }
    }

    /// Engine for `seat`.
    pub fn engine(&self, seat: usize) -> &SessionEngine<SimChannel, SimEnv> {
        &self.seats[seat].engine
    }

    /// Actions observed at `seat`, in order.
    pub fn notifications(&self, seat: usize) -> Vec<SessionAction> {
        self.seats[seat].notifications.borrow().clone()
    }

    /// Engine errors raised by deliveries.
    pub fn delivery_errors(&self) -> &[(usize, SessionError)] {
        &self.delivery_errors
    }

    /// Messages the coordinator refused.
    pub fn coordinator_errors(&self) -> &[(usize, RoomError)] {
        &self.coordinator_errors
    }

    /// Whether the coordinator considers the session running.
    pub fn coordinator_started(&self) -> bool {
        self.coordinator.is_started(&self.session)
    }

    /// Simulation environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Session id used by both seats.
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Participant id of `seat`.
    pub fn participant(&self, seat: usize) -> &ParticipantId {
        &self.seats[seat].participant
    }
}
