//! Room Manager
//!
//! Pairs connections into two-player sessions and relays their events.
//!
//! ## Responsibilities
//!
//! - Membership: admit up to `room_capacity` participants per session and
//!   broadcast the member list on every change
//! - Start: once every member is ready, flip one coin and announce the
//!   opening participant to both sides
//! - Relay: forward calls and win-announcements to every member, sender
//!   included
//!
//! ## Design
//!
//! - Action-based: all methods return actions, no direct I/O
//! - The coordinator never inspects boards or the ledger; game state lives in
//!   the peers' engines

use std::collections::{BTreeSet, HashMap};

use bingo_core::Environment;
use bingo_proto::{Message, MessageKind, ParticipantId, ProtoError, SessionId};

/// Opaque identifier for one transport connection.
pub type ConnectionId = u64;

/// Coordinator limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Participants per session.
    pub room_capacity: usize,
    /// Concurrent sessions before new ones are refused.
    pub max_rooms: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { room_capacity: 2, max_rooms: 10_000 }
    }
}

/// Actions returned by `RoomManager` for the server to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAction {
    /// Deliver `message` on connection `conn`.
    Send {
        /// Target connection
        conn: ConnectionId,
        /// Message to deliver
        message: Message,
    },
}

/// Errors from `RoomManager` operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// Message failed structural validation
    #[error("invalid message: {0}")]
    InvalidMessage(#[from] ProtoError),

    /// Session already holds its full complement of members
    #[error("session {session} is full")]
    RoomFull {
        /// Session that was full
        session: SessionId,
    },

    /// Too many live sessions to open another
    #[error("room limit of {max} reached")]
    TooManyRooms {
        /// Configured limit
        max: usize,
    },

    /// Participant id already taken in this session
    #[error("{participant} is already in session {session}")]
    DuplicateParticipant {
        /// Requested id
        participant: ParticipantId,
        /// Session it collided in
        session: SessionId,
    },

    /// Connection already joined a session
    #[error("connection {0} already joined a session")]
    AlreadyJoined(ConnectionId),

    /// Connection has not joined any session
    #[error("connection {0} has not joined a session")]
    NotJoined(ConnectionId),

    /// Message names a participant or session other than the connection's own
    #[error("connection {conn} is {expected}, message claims {claimed}")]
    Impersonation {
        /// Offending connection
        conn: ConnectionId,
        /// Identity bound to the connection
        expected: String,
        /// Identity the message claims
        claimed: String,
    },

    /// Game event before both members were ready
    #[error("session {0} has not started")]
    NotStarted(SessionId),

    /// Message kind only the coordinator may send
    #[error("{0} messages are not accepted from peers")]
    Unexpected(MessageKind),
}

impl RoomError {
    /// Returns true if the connection should be closed.
    ///
    /// Non-fatal errors are late or racing game events; the message is
    /// dropped and the connection stays open.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InvalidMessage(e) => e.is_fatal(),
            Self::NotStarted(_) => false,
            _ => true,
        }
    }
}

#[derive(Debug, Clone)]
struct Member {
    conn: ConnectionId,
    participant: ParticipantId,
}

#[derive(Debug, Default)]
struct Room {
    /// Members in join order.
    members: Vec<Member>,
    /// Members whose ready-announcement arrived.
    ready: BTreeSet<ParticipantId>,
    /// Start announced and no win seen since.
    started: bool,
}

impl Room {
    fn participants(&self) -> Vec<ParticipantId> {
        self.members.iter().map(|m| m.participant.clone()).collect()
    }

    fn broadcast(&self, message: &Message) -> Vec<RoomAction> {
        self.members
            .iter()
            .map(|m| RoomAction::Send { conn: m.conn, message: message.clone() })
            .collect()
    }

    fn reset_round(&mut self) {
        self.ready.clear();
        self.started = false;
    }
}

/// Session coordinator state machine.
///
/// # Type Parameters
///
/// - `E`: Environment used for the first-turn coin flip
pub struct RoomManager<E>
where
    E: Environment,
{
    env: E,
    config: CoordinatorConfig,
    rooms: HashMap<SessionId, Room>,
    /// Identity bound to each joined connection.
    connections: HashMap<ConnectionId, (SessionId, ParticipantId)>,
}

impl<E> RoomManager<E>
where
    E: Environment,
{
    /// Create an empty coordinator.
    pub fn new(env: E, config: CoordinatorConfig) -> Self {
        Self { env, config, rooms: HashMap::new(), connections: HashMap::new() }
    }

    /// Whether `session` has at least one member.
    pub fn has_room(&self, session: &SessionId) -> bool {
        self.rooms.contains_key(session)
    }

    /// Number of live sessions.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Members of `session` in join order.
    pub fn members(&self, session: &SessionId) -> Vec<ParticipantId> {
        self.rooms.get(session).map(Room::participants).unwrap_or_default()
    }

    /// Whether `session` has announced its start and not yet seen a win.
    pub fn is_started(&self, session: &SessionId) -> bool {
        self.rooms.get(session).is_some_and(|r| r.started)
    }

    /// Process one message received on `conn`.
    ///
    /// On error nothing changes and nothing is relayed.
    pub fn handle(
        &mut self,
        conn: ConnectionId,
        message: Message,
    ) -> Result<Vec<RoomAction>, RoomError> {
        message.validate()?;

        match message {
            Message::Join { participant, session } => self.handle_join(conn, participant, session),
            Message::Ready { .. } => self.handle_ready(conn, &message),
            Message::Call { .. } | Message::Win { .. } => self.handle_relay(conn, &message),
            Message::Members { .. } | Message::Start { .. } | Message::Left { .. } => {
                Err(RoomError::Unexpected(message.kind()))
            },
        }
    }

    /// Connection `conn` went away.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Vec<RoomAction> {
        let Some((session, participant)) = self.connections.remove(&conn) else {
            return vec![];
        };
        let Some(room) = self.rooms.get_mut(&session) else {
            return vec![];
        };

        room.members.retain(|m| m.conn != conn);
        room.reset_round();

        if room.members.is_empty() {
            self.rooms.remove(&session);
            tracing::debug!(%session, "room closed");
            return vec![];
        }

        tracing::info!(%session, %participant, "participant left");
        room.broadcast(&Message::Left { session, participant })
    }

    fn handle_join(
        &mut self,
        conn: ConnectionId,
        participant: ParticipantId,
        session: SessionId,
    ) -> Result<Vec<RoomAction>, RoomError> {
        if self.connections.contains_key(&conn) {
            return Err(RoomError::AlreadyJoined(conn));
        }

        if !self.rooms.contains_key(&session) && self.rooms.len() >= self.config.max_rooms {
            return Err(RoomError::TooManyRooms { max: self.config.max_rooms });
        }

        let capacity = self.config.room_capacity;
        let room = self.rooms.entry(session.clone()).or_default();
        if room.members.iter().any(|m| m.participant == participant) {
            return Err(RoomError::DuplicateParticipant { participant, session });
        }
        if room.members.len() >= capacity {
            return Err(RoomError::RoomFull { session });
        }

        room.members.push(Member { conn, participant: participant.clone() });
        tracing::info!(%session, %participant, members = room.members.len(), "participant joined");

        let members = Message::Members { session: session.clone(), participants: room.participants() };
        let actions = room.broadcast(&members);
        self.connections.insert(conn, (session, participant));
        Ok(actions)
    }

    fn handle_ready(
        &mut self,
        conn: ConnectionId,
        message: &Message,
    ) -> Result<Vec<RoomAction>, RoomError> {
        let (session, participant) = self.bound_identity(conn, message)?;
        let capacity = self.config.room_capacity;
        let Some(room) = self.rooms.get_mut(&session) else {
            return Err(RoomError::NotJoined(conn));
        };

        room.ready.insert(participant);
        let mut actions = room.broadcast(message);

        if !room.started && room.members.len() == capacity && room.ready.len() == capacity {
            let idx = self.env.random_index(room.members.len());
            let first_turn = room.members[idx].participant.clone();
            room.started = true;

            tracing::info!(%session, %first_turn, "session started");
            actions.extend(room.broadcast(&Message::Start { session, first_turn }));
        }

        Ok(actions)
    }

    fn handle_relay(
        &mut self,
        conn: ConnectionId,
        message: &Message,
    ) -> Result<Vec<RoomAction>, RoomError> {
        let (session, participant) = self.bound_identity(conn, message)?;
        let Some(room) = self.rooms.get_mut(&session) else {
            return Err(RoomError::NotJoined(conn));
        };

        if !room.started {
            return Err(RoomError::NotStarted(session));
        }

        if message.kind() == MessageKind::Win {
            tracing::info!(%session, winner = %participant, "session won");
            room.reset_round();
        }

        Ok(room.broadcast(message))
    }

    /// Identity bound to `conn`, checked against what `message` claims.
    fn bound_identity(
        &self,
        conn: ConnectionId,
        message: &Message,
    ) -> Result<(SessionId, ParticipantId), RoomError> {
        let (session, participant) =
            self.connections.get(&conn).ok_or(RoomError::NotJoined(conn))?;

        if message.session() != session {
            return Err(RoomError::Impersonation {
                conn,
                expected: session.to_string(),
                claimed: message.session().to_string(),
            });
        }
        if let Some(sender) = message.sender()
            && sender != participant
        {
            return Err(RoomError::Impersonation {
                conn,
                expected: participant.to_string(),
                claimed: sender.to_string(),
            });
        }

        Ok((session.clone(), participant.clone()))
    }
}
