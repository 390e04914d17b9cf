use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Command errors
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Identity errors
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    // Occupancy errors
    #[error("Invalid occupancy states: {0}")]
    InvalidOccupancy(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
