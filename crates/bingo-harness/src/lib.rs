//! Deterministic simulation harness for bingo sessions.
//!
//! Two real `SessionEngine`s talk through a real `RoomManager` over in-memory
//! channels, driven by a virtual clock and a seeded RNG. Every run is
//! reproducible from its seed.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and [`SimTable`], and
//! their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_channel;
pub mod sim_env;
pub mod table;

pub use model::{
    ModelTable, ObservableState, Operation, OperationError, OperationResult, SeatId, SeatView,
};
pub use sim_channel::SimChannel;
pub use sim_env::{SimEnv, SimInstant};
pub use table::{FaultConfig, SimTable};
