//! Hardware abstraction layer for the parking gate controller.
//!
//! This crate provides trait-based abstractions for the peripherals of one
//! barrier lane: the barrier actuator, the card reader at the lane, the
//! clearance line under the barrier, and the bank of slot occupancy lines.
//! The traits let the controller run against mock devices (development and
//! tests) or real drivers without change.
//!
//! # Design Philosophy
//!
//! - **Async-first**: I/O operations are native `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT).
//! - **Thread-safe**: All device traits require `Send + Sync`.
//! - **Error-aware**: All operations return `Result<T>` with detailed error information.
//!
//! # Device Traits
//!
//! ## Actuator
//!
//! The [`Actuator`] trait moves the barrier to a [`BarrierPosition`] and only
//! returns `Ok` once the position is reached:
//!
//! ```no_run
//! use parkgate_hardware::traits::Actuator;
//! use parkgate_hardware::types::BarrierPosition;
//! use parkgate_hardware::error::Result;
//!
//! async fn raise<A: Actuator>(barrier: &mut A) -> Result<()> {
//!     barrier.move_to(BarrierPosition::Open).await
//! }
//! ```
//!
//! ## Identity Reader
//!
//! The [`IdentityReader`] trait is polled for card presentations without blocking:
//!
//! ```no_run
//! use parkgate_hardware::traits::IdentityReader;
//! use parkgate_hardware::error::Result;
//!
//! async fn next_uid<R: IdentityReader>(reader: &mut R) -> Result<Option<String>> {
//!     Ok(reader.poll_card().await?.map(|card| card.uid_hex()))
//! }
//! ```
//!
//! ## Sensor Lines
//!
//! [`DigitalInput`] reads a single line (the clearance sensor) and
//! [`InputBank`] reads indexed lines (the slot sensors behind an I/O expander).
//!
//! # Mock Implementations
//!
//! The [`mock`] module provides simulated devices, each paired with a handle
//! used to drive it from tests or from the simulator.
//!
//! [`Actuator`]: traits::Actuator
//! [`IdentityReader`]: traits::IdentityReader
//! [`DigitalInput`]: traits::DigitalInput
//! [`InputBank`]: traits::InputBank
//! [`BarrierPosition`]: types::BarrierPosition

pub mod error;
pub mod mock;
pub mod sweep;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use sweep::{SweepActuator, SweepConfig};
pub use traits::{
    Actuator, CardData, CardType, DigitalInput, IdentityReader, InputBank, ServoOutput,
};
pub use types::{BarrierPosition, DeviceInfo, LineLevel, ReaderInfo};
