//! Timing parameters of the control cycle.

use std::time::Duration;

use parkgate_core::constants::{
    DEFAULT_ACTUATOR_TIMEOUT_MS, DEFAULT_CLOSE_SETTLE_MS, DEFAULT_HOLD_CEILING_MS,
    DEFAULT_HOLD_GRACE_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_REPORT_CADENCE_MS,
    DEFAULT_SCAN_SETTLE_MS, DEFAULT_TRANSPORT_COOLDOWN_MS,
};
use parkgate_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// All controller timings, in milliseconds.
///
/// Missing fields take their defaults when deserialized.
///
/// # Examples
///
/// ```
/// use parkgate_controller::GateTiming;
/// use std::time::Duration;
///
/// let timing = GateTiming::default();
/// assert_eq!(timing.hold_grace(), Duration::from_secs(3));
/// assert_eq!(timing.hold_ceiling(), Duration::from_secs(10));
/// assert!(timing.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateTiming {
    /// Minimum hold before a clear lane may close the gate.
    pub hold_grace_ms: u64,

    /// Hold after which the gate closes whatever the clearance sensor says.
    pub hold_ceiling_ms: u64,

    /// Interval between occupancy reports, from the end of the last one.
    pub report_cadence_ms: u64,

    /// Pause after each scan so the same card is not read twice.
    pub scan_settle_ms: u64,

    /// Pause after the barrier reaches the closed position.
    pub close_settle_ms: u64,

    /// Bound on one barrier motion.
    pub actuator_timeout_ms: u64,

    /// Sleep between two control cycles.
    pub poll_interval_ms: u64,

    /// Pause in reconnect attempts after a failed recovery window.
    pub transport_cooldown_ms: u64,
}

impl Default for GateTiming {
    fn default() -> Self {
        Self {
            hold_grace_ms: DEFAULT_HOLD_GRACE_MS,
            hold_ceiling_ms: DEFAULT_HOLD_CEILING_MS,
            report_cadence_ms: DEFAULT_REPORT_CADENCE_MS,
            scan_settle_ms: DEFAULT_SCAN_SETTLE_MS,
            close_settle_ms: DEFAULT_CLOSE_SETTLE_MS,
            actuator_timeout_ms: DEFAULT_ACTUATOR_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            transport_cooldown_ms: DEFAULT_TRANSPORT_COOLDOWN_MS,
        }
    }
}

impl GateTiming {
    pub fn hold_grace(&self) -> Duration {
        Duration::from_millis(self.hold_grace_ms)
    }

    pub fn hold_ceiling(&self) -> Duration {
        Duration::from_millis(self.hold_ceiling_ms)
    }

    pub fn report_cadence(&self) -> Duration {
        Duration::from_millis(self.report_cadence_ms)
    }

    pub fn scan_settle(&self) -> Duration {
        Duration::from_millis(self.scan_settle_ms)
    }

    pub fn close_settle(&self) -> Duration {
        Duration::from_millis(self.close_settle_ms)
    }

    pub fn actuator_timeout(&self) -> Duration {
        Duration::from_millis(self.actuator_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn transport_cooldown(&self) -> Duration {
        Duration::from_millis(self.transport_cooldown_ms)
    }

    /// Check the timings are usable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if:
    /// - The grace period is longer than the ceiling
    /// - The ceiling, report cadence, poll interval or actuator timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.hold_grace_ms > self.hold_ceiling_ms {
            return Err(Error::Config(format!(
                "hold grace ({}ms) exceeds hold ceiling ({}ms)",
                self.hold_grace_ms, self.hold_ceiling_ms
            )));
        }
        for (name, value) in [
            ("hold_ceiling_ms", self.hold_ceiling_ms),
            ("report_cadence_ms", self.report_cadence_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("actuator_timeout_ms", self.actuator_timeout_ms),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}
