//! Bingo wire protocol.
//!
//! Messages exchanged between the two peers and the session coordinator,
//! plus the length-prefixed CBOR framing used on stream transports.
//!
//! # Message Kinds
//!
//! - Peer events: [`Message::Ready`], [`Message::Start`], [`Message::Call`],
//!   [`Message::Win`]
//! - Coordinator control: [`Message::Join`], [`Message::Members`],
//!   [`Message::Left`]
//!
//! # Framing
//!
//! ```text
//! +----------------+---------------------------+
//! | length (u32be) | CBOR-encoded Message      |
//! +----------------+---------------------------+
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod frame;
mod ids;
mod message;

pub use error::ProtoError;
pub use frame::{HEADER_SIZE, MAX_FRAME_SIZE};
pub use ids::{ParticipantId, SessionId};
pub use message::{Message, MessageKind, Number};
