//! Mock digital input lines.
//!
//! [`MockLine`] stands in for the clearance sensor under the barrier and
//! [`MockInputBank`] for the slot sensors behind the I/O expander. Both
//! start with every line `High` (nothing detected).

use crate::{
    HardwareError, Result,
    traits::{DigitalInput, InputBank},
    types::LineLevel,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Mock single input line.
///
/// # Examples
///
/// ```
/// use parkgate_hardware::mock::MockLine;
/// use parkgate_hardware::traits::DigitalInput;
/// use parkgate_hardware::types::LineLevel;
///
/// #[tokio::main]
/// async fn main() -> parkgate_hardware::Result<()> {
///     let (line, handle) = MockLine::new();
///     assert_eq!(line.read_level().await?, LineLevel::High);
///
///     handle.set_level(LineLevel::Low);
///     assert_eq!(line.read_level().await?, LineLevel::Low);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockLine {
    high: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
}

impl MockLine {
    pub fn new() -> (Self, MockLineHandle) {
        let high = Arc::new(AtomicBool::new(true));
        let failing = Arc::new(AtomicBool::new(false));
        (
            Self {
                high: high.clone(),
                failing: failing.clone(),
            },
            MockLineHandle { high, failing },
        )
    }
}

impl DigitalInput for MockLine {
    async fn read_level(&self) -> Result<LineLevel> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HardwareError::communication("input line read failed"));
        }
        Ok(if self.high.load(Ordering::SeqCst) {
            LineLevel::High
        } else {
            LineLevel::Low
        })
    }
}

/// Handle for driving a [`MockLine`].
#[derive(Debug, Clone)]
pub struct MockLineHandle {
    high: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
}

impl MockLineHandle {
    pub fn set_level(&self, level: LineLevel) {
        self.high.store(level == LineLevel::High, Ordering::SeqCst);
    }

    /// Drive the line as an active-low sensor.
    pub fn set_active(&self, active: bool) {
        self.set_level(LineLevel::from_active(active));
    }

    pub fn level(&self) -> LineLevel {
        if self.high.load(Ordering::SeqCst) {
            LineLevel::High
        } else {
            LineLevel::Low
        }
    }

    /// Make reads fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct BankState {
    levels: Vec<LineLevel>,
    failing_line: Option<usize>,
}

/// Mock bank of input lines.
#[derive(Debug)]
pub struct MockInputBank {
    state: Arc<Mutex<BankState>>,
}

impl MockInputBank {
    /// Create a bank of `count` lines, all `High`.
    pub fn new(count: usize) -> (Self, MockInputBankHandle) {
        let state = Arc::new(Mutex::new(BankState {
            levels: vec![LineLevel::High; count],
            failing_line: None,
        }));
        (
            Self {
                state: state.clone(),
            },
            MockInputBankHandle { state },
        )
    }

    fn state(&self) -> MutexGuard<'_, BankState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl InputBank for MockInputBank {
    fn line_count(&self) -> usize {
        self.state().levels.len()
    }

    async fn read_line(&self, index: usize) -> Result<LineLevel> {
        let state = self.state();
        if state.failing_line == Some(index) {
            return Err(HardwareError::communication(format!(
                "expander read of line {index} failed"
            )));
        }
        state
            .levels
            .get(index)
            .copied()
            .ok_or(HardwareError::LineOutOfRange {
                index,
                count: state.levels.len(),
            })
    }
}

/// Handle for driving a [`MockInputBank`].
#[derive(Debug, Clone)]
pub struct MockInputBankHandle {
    state: Arc<Mutex<BankState>>,
}

impl MockInputBankHandle {
    fn state(&self) -> MutexGuard<'_, BankState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the level of one line.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is outside the bank.
    pub fn set_level(&self, index: usize, level: LineLevel) -> Result<()> {
        let mut state = self.state();
        let count = state.levels.len();
        let slot = state
            .levels
            .get_mut(index)
            .ok_or(HardwareError::LineOutOfRange { index, count })?;
        *slot = level;
        Ok(())
    }

    /// Drive one line as an active-low sensor.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is outside the bank.
    pub fn set_active(&self, index: usize, active: bool) -> Result<()> {
        self.set_level(index, LineLevel::from_active(active))
    }

    /// Make reads of one line fail, or clear the failure with `None`.
    pub fn fail_line(&self, index: Option<usize>) {
        self.state().failing_line = index;
    }

    pub fn line_count(&self) -> usize {
        self.state().levels.len()
    }

    /// Current level of one line, `None` outside the bank.
    pub fn level(&self, index: usize) -> Option<LineLevel> {
        self.state().levels.get(index).copied()
    }
}
