//! Error types for the gate controller.

use parkgate_hardware::{BarrierPosition, HardwareError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    /// The barrier did not confirm the commanded position
    #[error("actuator fault driving barrier {target}: {source}")]
    ActuatorFault {
        target: BarrierPosition,
        #[source]
        source: HardwareError,
    },

    /// Rejected transition or invalid configuration
    #[error(transparent)]
    Core(#[from] parkgate_core::Error),
}

impl ControllerError {
    pub fn actuator_fault(target: BarrierPosition, source: HardwareError) -> Self {
        Self::ActuatorFault { target, source }
    }

    pub fn is_actuator_fault(&self) -> bool {
        matches!(self, Self::ActuatorFault { .. })
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
