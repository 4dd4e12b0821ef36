//! Bingo session engine.
//!
//! Keeps two peers' views of a game consistent: board placement, the shared
//! call ledger, turn possession and line-completion progress. The core is
//! Sans-IO; all effects come back as [`SessionAction`]s.
//!
//! ## Architecture
//!
//! ```text
//! SessionEngine        (executes actions: channel + observers)
//!   └─ Session         (pure transition function)
//!        ├─ Board       (placement, sealing)
//!        ├─ CallLedger  (ordered, deduplicated calls)
//!        ├─ lines       (completion evaluation)
//!        └─ TurnArbiter (turn possession)
//! ```
//!
//! Time and randomness come from an [`Environment`], so the same code runs
//! under the deterministic simulation harness and in production.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod board;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod event;
pub mod ledger;
pub mod lines;
pub mod session;
pub mod turn;

pub use board::Board;
pub use config::{MAX_GRID_SIZE, SessionConfig};
pub use engine::{Channel, SessionEngine, SessionObserver};
pub use env::Environment;
pub use error::{ChannelError, ErrorKind, PlacementError, SessionError};
pub use event::{SessionAction, SessionEvent};
pub use ledger::{CallLedger, CallRecord};
pub use lines::{CalledNumbers, LineId, LineSet};
pub use session::Session;
pub use turn::{Seat, SessionResult, Transition, TurnArbiter, TurnState};
