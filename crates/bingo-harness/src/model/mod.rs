//! Reference model for model-based testing.
//!
//! The model captures the rules of a two-player session without any of the
//! machinery: no messages, no coordinator, no per-peer state. It serves as
//! the oracle against which the simulated peers are verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Rules not mechanism: one call list, one turn holder, one winner
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod table;

pub use operation::{Operation, OperationError, OperationResult, SeatId, pick_uncalled};
pub use table::{ModelTable, ObservableState, SeatView};
