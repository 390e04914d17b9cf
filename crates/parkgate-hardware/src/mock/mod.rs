//! Mock device implementations for testing and development.
//!
//! This module provides simulated device implementations that can be controlled
//! programmatically without requiring physical hardware. Each device comes with
//! a handle that the test (or the simulator) keeps to drive it.

pub mod line;
pub mod rfid;
pub mod servo;

// Re-export commonly used types
pub use line::{MockInputBank, MockInputBankHandle, MockLine, MockLineHandle};
pub use rfid::{MockRfid, MockRfidHandle};
pub use servo::{MockServo, MockServoHandle};
