//! Core constants for the parking gate controller.
//!
//! Timing values drive the gate hold window, the occupancy report cadence
//! and the settle delays of the control cycle. Wire values name the paths
//! and query parameters exchanged with the remote authority.
//!
//! # Usage
//!
//! ```
//! use parkgate_core::constants::*;
//! use std::time::Duration;
//!
//! let grace = Duration::from_millis(DEFAULT_HOLD_GRACE_MS);
//! let ceiling = Duration::from_millis(DEFAULT_HOLD_CEILING_MS);
//! assert!(grace < ceiling);
//! ```

// ============================================================================
// Gate Hold Window
// ============================================================================

/// Minimum time the barrier stays open before a clear lane may close it (milliseconds).
///
/// # Value: 3000ms
pub const DEFAULT_HOLD_GRACE_MS: u64 = 3000;

/// Absolute ceiling for an open barrier (milliseconds).
///
/// Once exceeded the barrier closes whatever the clearance sensor reports,
/// so a stuck sensor can never hold the gate open.
///
/// # Value: 10000ms
pub const DEFAULT_HOLD_CEILING_MS: u64 = 10000;

// ============================================================================
// Control Cycle
// ============================================================================

/// Delay after servicing a scan, so one card presentation is read once (milliseconds).
pub const DEFAULT_SCAN_SETTLE_MS: u64 = 1000;

/// Delay after the barrier has closed before the next cycle (milliseconds).
pub const DEFAULT_CLOSE_SETTLE_MS: u64 = 500;

/// Sleep between two control cycles (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Upper bound for one full barrier sweep before it is treated as a fault (milliseconds).
pub const DEFAULT_ACTUATOR_TIMEOUT_MS: u64 = 5000;

// ============================================================================
// Occupancy Reporting
// ============================================================================

/// Interval between two occupancy reports, measured from the end of the
/// previous report (milliseconds).
///
/// # Value: 10000ms
pub const DEFAULT_REPORT_CADENCE_MS: u64 = 10000;

/// Number of parking slots watched by the sensor bank.
pub const DEFAULT_CAPACITY: usize = 5;

/// Character used for an occupied slot in the report state string.
pub const SLOT_OCCUPIED: char = '1';

/// Character used for an empty slot in the report state string.
pub const SLOT_EMPTY: char = '0';

// ============================================================================
// Remote Authority
// ============================================================================

/// Timeout for authorization and report round-trips (milliseconds).
///
/// # Value: 15000ms
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 15000;

/// Path of the authorization request.
pub const AUTHORIZE_PATH: &str = "/api/rfid-request";

/// Path of the occupancy report.
pub const REPORT_PATH: &str = "/updateSlots";

/// Path served by the command endpoint.
pub const CONTROL_PATH: &str = "/control-gate";

/// Default base URL of the remote authority.
pub const DEFAULT_AUTHORITY_URL: &str = "http://127.0.0.1:3000";

/// Default bind address of the command endpoint.
pub const DEFAULT_COMMAND_LISTEN: &str = "0.0.0.0:80";

// ============================================================================
// Transport Recovery
// ============================================================================

/// Length of one bounded reconnect window (milliseconds).
pub const DEFAULT_RECONNECT_WINDOW_MS: u64 = 15000;

/// Fixed backoff between reconnect attempts (milliseconds).
pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 500;

/// Pause before a new reconnect window once a window is exhausted (milliseconds).
pub const DEFAULT_TRANSPORT_COOLDOWN_MS: u64 = 30000;

// ============================================================================
// Identity
// ============================================================================

/// Minimum card UID length in bytes (ISO 14443).
pub const MIN_UID_LENGTH: usize = 4;

/// Maximum card UID length in bytes (ISO 14443).
pub const MAX_UID_LENGTH: usize = 10;

/// Reported occupied count when the authority did not send one.
pub const OCCUPANCY_NOT_REPORTED: i32 = -1;
