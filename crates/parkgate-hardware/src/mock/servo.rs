//! Mock servo output for testing the barrier sweep.
//!
//! The mock records every commanded angle and can be told to jam at an
//! angle, in which case its feedback line keeps reporting that angle.

use crate::{HardwareError, Result, traits::ServoOutput};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct ServoState {
    angles: Vec<u8>,
    attached: bool,
    jammed_at: Option<u8>,
    fail_writes: bool,
}

/// Mock servo output with feedback.
///
/// # Examples
///
/// ```
/// use parkgate_hardware::mock::MockServo;
/// use parkgate_hardware::traits::ServoOutput;
///
/// let (mut servo, handle) = MockServo::new();
/// servo.attach().unwrap();
/// servo.write_angle(90).unwrap();
/// assert_eq!(handle.last_angle(), Some(90));
/// assert_eq!(servo.feedback_angle(), Some(90));
/// ```
#[derive(Debug)]
pub struct MockServo {
    state: Arc<Mutex<ServoState>>,
}

impl MockServo {
    pub fn new() -> (Self, MockServoHandle) {
        let state = Arc::new(Mutex::new(ServoState::default()));
        (
            Self {
                state: state.clone(),
            },
            MockServoHandle { state },
        )
    }

    fn state(&self) -> MutexGuard<'_, ServoState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ServoOutput for MockServo {
    fn attach(&mut self) -> Result<()> {
        self.state().attached = true;
        Ok(())
    }

    fn write_angle(&mut self, degrees: u8) -> Result<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(HardwareError::communication("PWM channel unavailable"));
        }
        if !state.attached {
            return Err(HardwareError::communication("servo not attached"));
        }
        state.angles.push(degrees);
        Ok(())
    }

    fn detach(&mut self) {
        self.state().attached = false;
    }

    fn feedback_angle(&self) -> Option<u8> {
        let state = self.state();
        state.jammed_at.or_else(|| state.angles.last().copied())
    }
}

/// Handle for inspecting and disturbing a [`MockServo`].
#[derive(Debug, Clone)]
pub struct MockServoHandle {
    state: Arc<Mutex<ServoState>>,
}

impl MockServoHandle {
    fn state(&self) -> MutexGuard<'_, ServoState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every angle written since creation or the last `clear_history`.
    pub fn written_angles(&self) -> Vec<u8> {
        self.state().angles.clone()
    }

    pub fn last_angle(&self) -> Option<u8> {
        self.state().angles.last().copied()
    }

    pub fn clear_history(&self) {
        self.state().angles.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.state().attached
    }

    /// Make the feedback line report `angle` whatever is commanded.
    pub fn jam_at(&self, angle: u8) {
        self.state().jammed_at = Some(angle);
    }

    pub fn release(&self) {
        self.state().jammed_at = None;
    }

    /// Make every write fail with a communication error.
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }
}
