//! Line-driven simulation of the lane.
//!
//! Each input line plays one event against the mock peripherals:
//!
//! | Line               | Effect                                   |
//! |--------------------|------------------------------------------|
//! | `card 04ABCDEF`    | present a card with that UID             |
//! | `car in` / `car out` | vehicle enters / leaves the clearance zone |
//! | `slot 2 on` / `off`  | slot sensor 2 occupied / free            |
//! | `status`           | log the simulated sensor and arm state   |
//! | `quit`             | stop the controller                      |

use parkgate_hardware::mock::{
    MockInputBankHandle, MockLineHandle, MockRfidHandle, MockServoHandle,
};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCommand {
    Card(Vec<u8>),
    CarIn,
    CarOut,
    Slot { index: usize, occupied: bool },
    Status,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid card UID: {0}")]
    InvalidUid(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<SimCommand>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("card", [uid]) => SimCommand::Card(parse_uid(uid)?),
        ("card", _) => return Err(ParseError::Usage("card <HEX UID>")),
        ("car", ["in"]) => SimCommand::CarIn,
        ("car", ["out"]) => SimCommand::CarOut,
        ("car", _) => return Err(ParseError::Usage("car in|out")),
        ("slot", [index, state]) => {
            let index = index
                .parse()
                .map_err(|_| ParseError::Usage("slot <index> on|off"))?;
            let occupied = match *state {
                "on" => true,
                "off" => false,
                _ => return Err(ParseError::Usage("slot <index> on|off")),
            };
            SimCommand::Slot { index, occupied }
        }
        ("slot", _) => return Err(ParseError::Usage("slot <index> on|off")),
        ("status", []) => SimCommand::Status,
        ("quit" | "exit", []) => SimCommand::Quit,
        _ => return Err(ParseError::Unknown(line.trim().to_string())),
    };
    Ok(Some(command))
}

fn parse_uid(hex: &str) -> Result<Vec<u8>, ParseError> {
    if hex.len() % 2 != 0 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ParseError::InvalidUid(hex.to_string()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
        .collect::<Result<_, _>>()
        .map_err(|_| ParseError::InvalidUid(hex.to_string()))
}

/// Drives the mock peripherals from text commands.
#[derive(Debug, Clone)]
pub struct Simulator {
    reader: MockRfidHandle,
    clearance: MockLineHandle,
    slots: MockInputBankHandle,
    servo: MockServoHandle,
}

impl Simulator {
    pub fn new(
        reader: MockRfidHandle,
        clearance: MockLineHandle,
        slots: MockInputBankHandle,
        servo: MockServoHandle,
    ) -> Self {
        Self {
            reader,
            clearance,
            slots,
            servo,
        }
    }

    /// Play lines from `input` until `quit`.
    ///
    /// End of input leaves the simulator idle rather than stopping the
    /// controller, so a detached process keeps running.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, input: R) {
        let mut lines = input.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Simulator input failed");
                    break;
                }
            };

            match parse_line(&line) {
                Ok(Some(SimCommand::Quit)) => {
                    info!("Quit requested");
                    return;
                }
                Ok(Some(command)) => self.apply(command).await,
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Ignoring simulator input"),
            }
        }

        info!("Simulator input closed");
        std::future::pending::<()>().await;
    }

    /// Apply one event to the peripherals.
    pub async fn apply(&self, command: SimCommand) {
        match command {
            SimCommand::Card(uid) => {
                if let Err(e) = self.reader.present_card(uid).await {
                    warn!(error = %e, "Card not presented");
                }
            }
            SimCommand::CarIn => self.clearance.set_active(true),
            SimCommand::CarOut => self.clearance.set_active(false),
            SimCommand::Slot { index, occupied } => {
                if let Err(e) = self.slots.set_active(index, occupied) {
                    warn!(error = %e, "Slot not changed");
                }
            }
            SimCommand::Status => info!(
                arm_angle = ?self.servo.last_angle(),
                lane_blocked = self.clearance.level().is_active(),
                slots = %self.slot_string(),
                "Simulator status"
            ),
            SimCommand::Quit => {}
        }
    }

    fn slot_string(&self) -> String {
        (0..self.slots.line_count())
            .map(|i| match self.slots.level(i) {
                Some(level) if level.is_active() => '1',
                Some(_) => '0',
                None => '?',
            })
            .collect()
    }
}
