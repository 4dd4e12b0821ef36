//! Protocol messages.
//!
//! Peer events are produced by one engine and consumed by the other,
//! relayed unchanged by the coordinator. Control messages only travel
//! between a peer and the coordinator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ParticipantId, ProtoError, SessionId};

/// A number that can be placed on a board and called.
pub type Number = u16;

/// Every message that crosses the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    /// Peer asks the coordinator to place it in a session.
    Join {
        /// Joining participant.
        participant: ParticipantId,
        /// Session (room) to join.
        session: SessionId,
    },

    /// Coordinator broadcasts the current membership of a session.
    Members {
        /// Session the membership belongs to.
        session: SessionId,
        /// Participants in join order.
        participants: Vec<ParticipantId>,
    },

    /// Ready-announcement: the participant's board is complete.
    Ready {
        /// Participant that is ready.
        participant: ParticipantId,
        /// Session it is ready in.
        session: SessionId,
    },

    /// Start-announcement emitted once by the coordinator.
    ///
    /// Carries the single coin-flip decision so both peers agree on who
    /// opens the game.
    Start {
        /// Session that starts.
        session: SessionId,
        /// Participant holding the first turn.
        first_turn: ParticipantId,
    },

    /// Call-announcement.
    Call {
        /// Participant that called the number.
        participant: ParticipantId,
        /// Session the call belongs to.
        session: SessionId,
        /// Called number.
        number: Number,
        /// Caller's completed line count after applying this call.
        lines: u8,
    },

    /// Win-announcement naming the winner.
    Win {
        /// Winning participant.
        participant: ParticipantId,
        /// Session that was won.
        session: SessionId,
    },

    /// Coordinator reports that a participant disconnected.
    Left {
        /// Session the participant left.
        session: SessionId,
        /// Participant that left.
        participant: ParticipantId,
    },
}

/// Discriminant of [`Message`], used for logging and dispatch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// [`Message::Join`]
    Join,
    /// [`Message::Members`]
    Members,
    /// [`Message::Ready`]
    Ready,
    /// [`Message::Start`]
    Start,
    /// [`Message::Call`]
    Call,
    /// [`Message::Win`]
    Win,
    /// [`Message::Left`]
    Left,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Join => "join",
            Self::Members => "members",
            Self::Ready => "ready",
            Self::Start => "start",
            Self::Call => "call",
            Self::Win => "win",
            Self::Left => "left",
        };
        f.write_str(name)
    }
}

impl Message {
    /// The message discriminant.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Join { .. } => MessageKind::Join,
            Self::Members { .. } => MessageKind::Members,
            Self::Ready { .. } => MessageKind::Ready,
            Self::Start { .. } => MessageKind::Start,
            Self::Call { .. } => MessageKind::Call,
            Self::Win { .. } => MessageKind::Win,
            Self::Left { .. } => MessageKind::Left,
        }
    }

    /// Session this message is scoped to.
    pub fn session(&self) -> &SessionId {
        match self {
            Self::Join { session, .. }
            | Self::Members { session, .. }
            | Self::Ready { session, .. }
            | Self::Start { session, .. }
            | Self::Call { session, .. }
            | Self::Win { session, .. }
            | Self::Left { session, .. } => session,
        }
    }

    /// Participant that originated the message, if it names one.
    ///
    /// `Members` and `Start` originate at the coordinator and return `None`.
    /// `Left` names the departed participant, not a sender, and also returns
    /// `None`.
    pub fn sender(&self) -> Option<&ParticipantId> {
        match self {
            Self::Join { participant, .. }
            | Self::Ready { participant, .. }
            | Self::Call { participant, .. }
            | Self::Win { participant, .. } => Some(participant),
            Self::Members { .. } | Self::Start { .. } | Self::Left { .. } => None,
        }
    }

    /// Structural validation independent of any session state.
    ///
    /// Range checks against a particular board size are left to the engine.
    pub fn validate(&self) -> Result<(), ProtoError> {
        if !self.session().is_valid() {
            return Err(invalid("session id is blank"));
        }

        match self {
            Self::Join { participant, .. }
            | Self::Ready { participant, .. }
            | Self::Win { participant, .. }
            | Self::Left { participant, .. }
            | Self::Start { first_turn: participant, .. } => check_participant(participant),
            Self::Call { participant, number, .. } => {
                check_participant(participant)?;
                if *number == 0 {
                    return Err(invalid("called number must be positive"));
                }
                Ok(())
            },
            Self::Members { participants, .. } => {
                participants.iter().try_for_each(check_participant)?;
                for (i, p) in participants.iter().enumerate() {
                    if participants[..i].contains(p) {
                        return Err(invalid(format!("participant {p} listed twice")));
                    }
                }
                Ok(())
            },
        }
    }
}

fn check_participant(participant: &ParticipantId) -> Result<(), ProtoError> {
    if participant.is_valid() { Ok(()) } else { Err(invalid("participant id is blank")) }
}

fn invalid(reason: impl Into<String>) -> ProtoError {
    ProtoError::Invalid { reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(number: Number) -> Message {
        Message::Call {
            participant: "alice".into(),
            session: "room".into(),
            number,
            lines: 0,
        }
    }

    #[test]
    fn call_with_zero_is_invalid() {
        assert!(matches!(call(0).validate(), Err(ProtoError::Invalid { .. })));
        assert!(call(1).validate().is_ok());
    }

    #[test]
    fn blank_session_is_invalid() {
        let msg = Message::Ready { participant: "alice".into(), session: " ".into() };
        assert!(msg.validate().is_err());
    }

    #[test]
    fn members_reject_duplicates() {
        let msg = Message::Members {
            session: "room".into(),
            participants: vec!["alice".into(), "alice".into()],
        };
        assert!(msg.validate().is_err());
    }

    #[test]
    fn start_has_no_sender() {
        let msg = Message::Start { session: "room".into(), first_turn: "bob".into() };
        assert_eq!(msg.sender(), None);
        assert_eq!(msg.kind(), MessageKind::Start);
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn call_sender_is_participant() {
        assert_eq!(call(3).sender(), Some(&ParticipantId::from("alice")));
        assert_eq!(call(3).kind().to_string(), "call");
    }
}
