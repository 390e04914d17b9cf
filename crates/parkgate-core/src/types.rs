use crate::{
    Result,
    constants::{MAX_UID_LENGTH, MIN_UID_LENGTH, OCCUPANCY_NOT_REPORTED, SLOT_EMPTY, SLOT_OCCUPIED},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the barrier.
///
/// Exactly one value holds at any instant. Only the gate state machine
/// mutates it, and only along the edges accepted by
/// [`can_transition_to`](GateState::can_transition_to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Barrier down, waiting for a scan or an operator command.
    Closed,

    /// Barrier sweeping towards the open position.
    Opening,

    /// Barrier up, hold window armed.
    OpenHold,

    /// Barrier sweeping towards the closed position.
    Closing,
}

impl GateState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use parkgate_core::GateState;
    ///
    /// assert!(GateState::Closed.can_transition_to(&GateState::Opening));
    /// assert!(!GateState::Closed.can_transition_to(&GateState::OpenHold));
    /// assert!(!GateState::Opening.can_transition_to(&GateState::Closing));
    /// ```
    pub fn can_transition_to(&self, target: &GateState) -> bool {
        matches!(
            (self, target),
            (GateState::Closed, GateState::Opening)
                | (GateState::Opening, GateState::OpenHold)
                | (GateState::OpenHold, GateState::Closing)
                | (GateState::Closing, GateState::Closed)
        )
    }

    /// Returns `true` while the barrier is sweeping.
    #[inline]
    #[must_use]
    pub fn is_moving(self) -> bool {
        matches!(self, GateState::Opening | GateState::Closing)
    }

    /// Returns `true` if the barrier is down.
    #[inline]
    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(self, GateState::Closed)
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            GateState::Closed => "Closed",
            GateState::Opening => "Opening",
            GateState::OpenHold => "OpenHold",
            GateState::Closing => "Closing",
        };
        write!(f, "{}", state_str)
    }
}

/// Operator command received from the remote authority.
///
/// Commands carry no identity. The accepted wire values are exactly
/// `open` and `close`; anything else is rejected as a bad request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    Open,
    Close,
}

impl ControlCommand {
    /// Wire value of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ControlCommand::Open => "open",
            ControlCommand::Close => "close",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ControlCommand {
    type Err = Error;

    /// Parse a wire value. Matching is case-sensitive.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(ControlCommand::Open),
            "close" => Ok(ControlCommand::Close),
            other => Err(Error::InvalidCommand(format!(
                "unknown action '{other}', expected 'open' or 'close'"
            ))),
        }
    }
}

/// Result of applying a [`ControlCommand`] to the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// The command drove the gate; `state` is the state after completion.
    Applied { state: GateState },

    /// The gate was already where the command wanted it.
    Unchanged { state: GateState },

    /// The barrier is sweeping; the command was not applied.
    Busy { state: GateState },

    /// The actuator did not confirm the requested position.
    Failed { state: GateState, reason: String },
}

impl CommandOutcome {
    /// Returns `true` for outcomes reported to the caller as success.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            CommandOutcome::Applied { .. } | CommandOutcome::Unchanged { .. }
        )
    }

    /// Gate state observed when the outcome was produced.
    #[must_use]
    pub fn state(&self) -> GateState {
        match self {
            CommandOutcome::Applied { state }
            | CommandOutcome::Unchanged { state }
            | CommandOutcome::Busy { state }
            | CommandOutcome::Failed { state, .. } => *state,
        }
    }
}

/// One credential presentation read by the identity reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierScan {
    /// Upper-case hexadecimal rendering of the card UID.
    pub id: String,

    /// Wall-clock time the card was read.
    pub observed_at: DateTime<Utc>,
}

impl IdentifierScan {
    /// Build a scan from raw UID bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidIdentifier` if the UID is not 4-10 bytes long.
    ///
    /// # Examples
    ///
    /// ```
    /// use parkgate_core::IdentifierScan;
    ///
    /// let scan = IdentifierScan::from_uid(&[0x04, 0xAB, 0x0C, 0xEF], chrono::Utc::now()).unwrap();
    /// assert_eq!(scan.id, "04AB0CEF");
    /// ```
    pub fn from_uid(uid: &[u8], observed_at: DateTime<Utc>) -> Result<Self> {
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&uid.len()) {
            return Err(Error::InvalidIdentifier(format!(
                "UID must be {MIN_UID_LENGTH}-{MAX_UID_LENGTH} bytes, got {}",
                uid.len()
            )));
        }
        let id = uid.iter().map(|b| format!("{b:02X}")).collect();
        Ok(Self { id, observed_at })
    }
}

impl fmt::Display for IdentifierScan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Decision returned by the remote authority for one scan.
///
/// Any failure on the way (no transport, timeout, error status, undecodable
/// body) is represented as a denied decision: access fails closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    pub granted: bool,

    /// Occupied slot count known to the authority, `-1` when not reported.
    pub reported_occupied_count: i32,

    pub message: String,

    pub plate: Option<String>,

    pub fee: Option<i64>,
}

impl AuthorizationDecision {
    /// A negative decision carrying a diagnostic message.
    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            granted: false,
            reported_occupied_count: OCCUPANCY_NOT_REPORTED,
            message: message.into(),
            plate: None,
            fee: None,
        }
    }

    /// Human-readable line combining message, plate and fee.
    ///
    /// # Examples
    ///
    /// ```
    /// use parkgate_core::AuthorizationDecision;
    ///
    /// let mut decision = AuthorizationDecision::denied("Goodbye");
    /// decision.plate = Some("51F-12345".to_string());
    /// decision.fee = Some(5000);
    /// assert_eq!(decision.summary(), "Goodbye Plate: 51F-12345. Fee: 5000 VND.");
    /// ```
    #[must_use]
    pub fn summary(&self) -> String {
        let plate = self.plate.as_deref().unwrap_or("N/A");
        match self.fee {
            Some(fee) => format!("{} Plate: {plate}. Fee: {fee} VND.", self.message),
            None => format!("{} Plate: {plate}.", self.message),
        }
    }
}

/// Occupancy of every slot, in sensor order. `true` means occupied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OccupancyBitmap(Vec<bool>);

impl OccupancyBitmap {
    pub fn new(slots: Vec<bool>) -> Self {
        Self(slots)
    }

    /// Number of slots (facility capacity).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.0.iter().filter(|occupied| **occupied).count()
    }

    /// Occupancy of one slot, `None` when out of range.
    #[must_use]
    pub fn is_occupied(&self, index: usize) -> Option<bool> {
        self.0.get(index).copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Fixed-length `'1'`/`'0'` rendering used on the wire.
    ///
    /// # Examples
    ///
    /// ```
    /// use parkgate_core::OccupancyBitmap;
    ///
    /// let bitmap = OccupancyBitmap::new(vec![true, false, false, true, false]);
    /// assert_eq!(bitmap.to_state_string(), "10010");
    /// ```
    #[must_use]
    pub fn to_state_string(&self) -> String {
        self.0
            .iter()
            .map(|occupied| if *occupied { SLOT_OCCUPIED } else { SLOT_EMPTY })
            .collect()
    }
}

impl fmt::Display for OccupancyBitmap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_state_string())
    }
}

impl std::str::FromStr for OccupancyBitmap {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .map(|c| match c {
                SLOT_OCCUPIED => Ok(true),
                SLOT_EMPTY => Ok(false),
                other => Err(Error::InvalidOccupancy(format!(
                    "unexpected character '{other}' in '{s}'"
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(OccupancyBitmap)
    }
}

impl FromIterator<bool> for OccupancyBitmap {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        OccupancyBitmap(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(GateState::Closed, GateState::Opening)]
    #[case(GateState::Opening, GateState::OpenHold)]
    #[case(GateState::OpenHold, GateState::Closing)]
    #[case(GateState::Closing, GateState::Closed)]
    fn test_gate_state_defined_edges(#[case] from: GateState, #[case] to: GateState) {
        assert!(from.can_transition_to(&to));
    }

    #[rstest]
    #[case(GateState::Closed, GateState::OpenHold)]
    #[case(GateState::Closed, GateState::Closing)]
    #[case(GateState::Opening, GateState::Closing)]
    #[case(GateState::Opening, GateState::Closed)]
    #[case(GateState::OpenHold, GateState::Closed)]
    #[case(GateState::OpenHold, GateState::Opening)]
    #[case(GateState::Closing, GateState::Opening)]
    #[case(GateState::Closing, GateState::OpenHold)]
    #[case(GateState::Closed, GateState::Closed)]
    fn test_gate_state_undefined_edges(#[case] from: GateState, #[case] to: GateState) {
        assert!(!from.can_transition_to(&to));
    }

    #[test]
    fn test_gate_state_moving() {
        assert!(GateState::Opening.is_moving());
        assert!(GateState::Closing.is_moving());
        assert!(!GateState::Closed.is_moving());
        assert!(!GateState::OpenHold.is_moving());
    }

    #[test]
    fn test_gate_state_serialization() {
        let json = serde_json::to_string(&GateState::OpenHold).unwrap();
        assert_eq!(json, "\"open_hold\"");
    }

    #[rstest]
    #[case("open", ControlCommand::Open)]
    #[case("close", ControlCommand::Close)]
    fn test_command_parse_valid(#[case] input: &str, #[case] expected: ControlCommand) {
        let command: ControlCommand = input.parse().unwrap();
        assert_eq!(command, expected);
        assert_eq!(command.as_str(), input);
    }

    #[rstest]
    #[case("OPEN")]
    #[case("Close")]
    #[case(" open")]
    #[case("toggle")]
    #[case("")]
    fn test_command_parse_invalid(#[case] input: &str) {
        let result: Result<ControlCommand> = input.parse();
        assert!(matches!(result, Err(Error::InvalidCommand(_))));
    }

    #[test]
    fn test_command_outcome_accepted() {
        assert!(
            CommandOutcome::Applied {
                state: GateState::OpenHold
            }
            .is_accepted()
        );
        assert!(
            CommandOutcome::Unchanged {
                state: GateState::OpenHold
            }
            .is_accepted()
        );
        assert!(
            !CommandOutcome::Busy {
                state: GateState::Opening
            }
            .is_accepted()
        );
        let failed = CommandOutcome::Failed {
            state: GateState::Opening,
            reason: "jammed".to_string(),
        };
        assert!(!failed.is_accepted());
        assert_eq!(failed.state(), GateState::Opening);
    }

    #[test]
    fn test_scan_from_uid_pads_and_uppercases() {
        let scan = IdentifierScan::from_uid(&[0x01, 0x0a, 0xff, 0x00], Utc::now()).unwrap();
        assert_eq!(scan.id, "010AFF00");
    }

    #[rstest]
    #[case(vec![0x01, 0x02, 0x03])]
    #[case(vec![0u8; 11])]
    #[case(vec![])]
    fn test_scan_from_uid_rejects_length(#[case] uid: Vec<u8>) {
        let result = IdentifierScan::from_uid(&uid, Utc::now());
        assert!(matches!(result, Err(Error::InvalidIdentifier(_))));
    }

    #[test]
    fn test_denied_decision_defaults() {
        let decision = AuthorizationDecision::denied("transport unavailable");
        assert!(!decision.granted);
        assert_eq!(decision.reported_occupied_count, -1);
        assert_eq!(decision.summary(), "transport unavailable Plate: N/A.");
    }

    #[test]
    fn test_bitmap_counts() {
        let bitmap = OccupancyBitmap::new(vec![true, false, false, true, false]);
        assert_eq!(bitmap.capacity(), 5);
        assert_eq!(bitmap.occupied_count(), 2);
        assert_eq!(bitmap.is_occupied(3), Some(true));
        assert_eq!(bitmap.is_occupied(5), None);
        assert_eq!(bitmap.to_string(), "10010");
    }

    #[test]
    fn test_bitmap_parse() {
        let bitmap: OccupancyBitmap = "0110".parse().unwrap();
        assert_eq!(bitmap.as_slice(), &[false, true, true, false]);
        assert!("01x0".parse::<OccupancyBitmap>().is_err());
    }
}
