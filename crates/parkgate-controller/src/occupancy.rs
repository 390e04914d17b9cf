//! Slot occupancy sampling and report cadence.

use std::time::Duration;

use parkgate_core::OccupancyBitmap;
use parkgate_hardware::{InputBank, Result};
use tokio::time::Instant;

/// Reads every slot sensor of the bank into a bitmap.
#[derive(Debug)]
pub struct OccupancySampler<B: InputBank> {
    bank: B,
}

impl<B: InputBank> OccupancySampler<B> {
    pub fn new(bank: B) -> Self {
        Self { bank }
    }

    /// Facility capacity: one slot per line.
    pub fn capacity(&self) -> usize {
        self.bank.line_count()
    }

    /// Sample all lines in order. An active line is an occupied slot.
    ///
    /// # Errors
    ///
    /// Returns the first line read error; no partial bitmap is produced.
    pub async fn sample(&self) -> Result<OccupancyBitmap> {
        let mut slots = Vec::with_capacity(self.capacity());
        for index in 0..self.capacity() {
            slots.push(self.bank.read_line(index).await?.is_active());
        }
        Ok(OccupancyBitmap::new(slots))
    }
}

/// Fixed-interval schedule measured from the end of the previous run.
///
/// # Examples
///
/// ```
/// use parkgate_controller::ReportCadence;
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// let start = Instant::now();
/// let mut cadence = ReportCadence::new(Duration::from_secs(10), start);
/// assert!(!cadence.is_due(start + Duration::from_millis(9999)));
/// assert!(cadence.is_due(start + Duration::from_secs(10)));
///
/// cadence.mark_done(start + Duration::from_secs(12));
/// assert!(!cadence.is_due(start + Duration::from_secs(21)));
/// assert!(cadence.is_due(start + Duration::from_secs(22)));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ReportCadence {
    interval: Duration,
    last: Instant,
}

impl ReportCadence {
    /// First run is due one interval after `start`.
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last: start,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) >= self.interval
    }

    /// Record that a run finished at `now`.
    pub fn mark_done(&mut self, now: Instant) {
        self.last = now;
    }

    pub fn next_due(&self) -> Instant {
        self.last + self.interval
    }
}
