//! Stepped barrier sweep over a servo output.
//!
//! A hobby servo jumps to a commanded angle at full speed, which is rough on
//! a barrier arm. [`SweepActuator`] walks the commanded angle towards the
//! target in fixed increments with a fixed delay between increments, then
//! releases the PWM signal. The arm rests at the closed angle when down.
//!
//! ```text
//!  closed 150° ──step 2°──► ... ──step 2°──► 0° open
//!             (20 ms between steps, ~1.5 s per travel)
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HardwareError, Result};
use crate::traits::{Actuator, ServoOutput};
use crate::types::{BarrierPosition, DeviceInfo};

/// Geometry and pacing of a barrier sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Servo angle with the arm down.
    pub closed_angle: u8,

    /// Servo angle with the arm up.
    pub open_angle: u8,

    /// Degrees per increment.
    pub step_degrees: u8,

    /// Delay between two increments (milliseconds).
    pub step_delay_ms: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            closed_angle: 150,
            open_angle: 0,
            step_degrees: 2,
            step_delay_ms: 20,
        }
    }
}

impl SweepConfig {
    /// Servo angle for a barrier position.
    pub fn angle_for(&self, position: BarrierPosition) -> u8 {
        match position {
            BarrierPosition::Open => self.open_angle,
            BarrierPosition::Closed => self.closed_angle,
        }
    }

    /// Nominal duration of one full travel.
    pub fn travel_time(&self) -> Duration {
        let span = self.closed_angle.abs_diff(self.open_angle) as u64;
        let steps = span.div_ceil(self.step_degrees.max(1) as u64);
        Duration::from_millis(steps * self.step_delay_ms)
    }

    /// Validate the sweep geometry.
    ///
    /// # Errors
    ///
    /// Returns an error if the step is zero or the travel is empty.
    pub fn validate(&self) -> Result<()> {
        if self.step_degrees == 0 {
            return Err(HardwareError::initialization_failed(
                "sweep step must be at least 1 degree",
            ));
        }
        if self.open_angle == self.closed_angle {
            return Err(HardwareError::initialization_failed(
                "open and closed angles must differ",
            ));
        }
        Ok(())
    }
}

/// Barrier actuator driving a servo through a stepped sweep.
///
/// The commanded angle starts at the open angle, so the first homing move
/// to [`BarrierPosition::Closed`] covers the full travel.
#[derive(Debug)]
pub struct SweepActuator<O: ServoOutput> {
    output: O,
    config: SweepConfig,
    angle: u8,
    position: Option<BarrierPosition>,
}

impl<O: ServoOutput> SweepActuator<O> {
    pub fn new(output: O, config: SweepConfig) -> Self {
        let angle = config.open_angle;
        Self {
            output,
            config,
            angle,
            position: None,
        }
    }

    /// Last commanded angle.
    pub fn angle(&self) -> u8 {
        self.angle
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }
}

/// Detaches the output when dropped, including when a sweep is cancelled.
struct Attached<'a, O: ServoOutput>(&'a mut O);

impl<O: ServoOutput> Drop for Attached<'_, O> {
    fn drop(&mut self) {
        self.0.detach();
    }
}

async fn sweep<O: ServoOutput>(
    output: &mut O,
    angle: &mut u8,
    target: u8,
    config: &SweepConfig,
) -> Result<()> {
    let step = config.step_degrees.max(1);
    let delay = Duration::from_millis(config.step_delay_ms);
    let mut next = *angle;

    loop {
        output.write_angle(next)?;
        *angle = next;
        if next == target {
            return Ok(());
        }
        next = step_towards(next, target, step);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn step_towards(angle: u8, target: u8, step: u8) -> u8 {
    if angle < target {
        angle.saturating_add(step).min(target)
    } else {
        angle.saturating_sub(step).max(target)
    }
}

impl<O: ServoOutput> Actuator for SweepActuator<O> {
    async fn move_to(&mut self, target: BarrierPosition) -> Result<()> {
        let target_angle = self.config.angle_for(target);
        debug!(from = self.angle, to = target_angle, %target, "Sweeping barrier");

        // Position is unknown until the sweep is confirmed
        self.position = None;
        self.output.attach()?;
        {
            let mut attached = Attached(&mut self.output);
            sweep(&mut *attached.0, &mut self.angle, target_angle, &self.config).await?;
        }

        if let Some(actual) = self.output.feedback_angle()
            && actual != target_angle
        {
            warn!(target_angle, actual, "Barrier did not reach commanded angle");
            return Err(HardwareError::position_not_reached(target_angle, actual));
        }

        self.position = Some(target);
        Ok(())
    }

    fn position(&self) -> Option<BarrierPosition> {
        self.position
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new("Barrier servo", "Stepped sweep actuator"))
    }
}
