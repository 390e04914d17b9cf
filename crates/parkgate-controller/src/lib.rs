//! Gate controller for the parking facility.
//!
//! This crate contains the barrier state machine, the occupancy sampler and
//! the control cycle tying them to the lane peripherals and the remote
//! authority.

pub mod controller;
pub mod error;
pub mod occupancy;
pub mod state_machine;
pub mod timing;

pub use controller::{GateController, Peripherals};
pub use error::{ControllerError, Result};
pub use occupancy::{OccupancySampler, ReportCadence};
pub use state_machine::{
    Clearance, CloseReason, GateStateMachine, GateStateMachineBuilder, MAX_HISTORY_SIZE,
    OpenWindow, StateTransition,
};
pub use timing::GateTiming;
