//! Hardware device trait definitions.
//!
//! These traits establish the contract between the gate controller and the
//! peripherals of a lane, enabling easy substitution between mock and real
//! hardware implementations.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use parkgate_core::IdentifierScan;
use parkgate_core::constants::{MAX_UID_LENGTH, MIN_UID_LENGTH};

use crate::error::Result;
use crate::types::{BarrierPosition, DeviceInfo, LineLevel, ReaderInfo};

/// RFID card type identification.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardType {
    /// Mifare Classic 1K (1024 bytes).
    MifareClassic1K,

    /// Mifare Ultralight (64 bytes).
    MifareUltralight,

    /// Unknown card type with SAK/ATQA bytes.
    Unknown(Vec<u8>),
}

impl CardType {
    /// Get a human-readable name for the card type.
    pub fn name(&self) -> &str {
        match self {
            Self::MifareClassic1K => "Mifare Classic 1K",
            Self::MifareUltralight => "Mifare Ultralight",
            Self::Unknown(_) => "Unknown",
        }
    }
}

/// RFID card data.
///
/// Contains the unique identifier (UID), card type, and read timestamp of a
/// card presented to the lane reader.
#[derive(Debug, Clone)]
pub struct CardData {
    /// Card unique identifier (4-10 bytes).
    pub uid: Vec<u8>,

    /// Card type identification.
    pub card_type: CardType,

    /// Timestamp when the card was read.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl CardData {
    /// Create new card data with the current timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the UID length is not within the valid range
    /// of 4-10 bytes as specified by ISO 14443.
    ///
    /// # Examples
    ///
    /// ```
    /// use parkgate_hardware::traits::{CardData, CardType};
    ///
    /// let card = CardData::new(vec![0x04, 0xAB, 0xCD, 0xEF], CardType::MifareClassic1K).unwrap();
    /// assert_eq!(card.uid_hex(), "04ABCDEF");
    /// ```
    pub fn new(uid: Vec<u8>, card_type: CardType) -> Result<Self> {
        let uid_len = uid.len();
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&uid_len) {
            return Err(crate::HardwareError::invalid_data(format!(
                "Card UID length must be between {} and {} bytes, got {}",
                MIN_UID_LENGTH, MAX_UID_LENGTH, uid_len
            )));
        }

        Ok(Self {
            uid,
            card_type,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Get the UID as an upper-case, zero-padded hexadecimal string.
    pub fn uid_hex(&self) -> String {
        self.uid.iter().map(|b| format!("{:02X}", b)).collect()
    }

    /// Convert the read into the scan consumed by the controller.
    pub fn to_scan(&self) -> Result<IdentifierScan> {
        IdentifierScan::from_uid(&self.uid, self.timestamp)
            .map_err(|e| crate::HardwareError::invalid_data(e.to_string()))
    }
}

/// Identity reader at the lane (MFRC522 class RFID reader).
///
/// The controller polls the reader once per cycle, so `poll_card` must
/// return immediately with `Ok(None)` when no new card is in the field.
///
/// # Examples
///
/// ```no_run
/// use parkgate_hardware::traits::IdentityReader;
/// use parkgate_hardware::error::Result;
///
/// async fn drain<R: IdentityReader>(reader: &mut R) -> Result<usize> {
///     let mut count = 0;
///     while reader.poll_card().await?.is_some() {
///         reader.halt().await?;
///         count += 1;
///     }
///     Ok(count)
/// }
/// ```
pub trait IdentityReader: Send + Sync {
    /// Return the next newly presented card, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The device is disconnected
    /// - The card UID could not be read
    async fn poll_card(&mut self) -> Result<Option<CardData>>;

    /// Put the card in the field to sleep so it is not read again.
    ///
    /// # Errors
    ///
    /// Returns an error if a communication error occurs.
    async fn halt(&mut self) -> Result<()>;

    /// Get reader information.
    ///
    /// # Errors
    ///
    /// Returns an error if a communication error occurs while querying
    /// reader information.
    async fn get_reader_info(&self) -> Result<ReaderInfo>;
}

/// Barrier actuator.
///
/// `move_to` performs the whole travel to the target and returns only once
/// the target is reached, or with an error if the arm could not confirm it.
/// Callers treat a motion as atomic.
pub trait Actuator: Send + Sync {
    /// Drive the barrier to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The output driver fails
    /// - The arm reports a position other than the target
    async fn move_to(&mut self, target: BarrierPosition) -> Result<()>;

    /// Last position confirmed by a completed `move_to`.
    fn position(&self) -> Option<BarrierPosition>;

    /// Get device information.
    ///
    /// # Errors
    ///
    /// Returns an error if a communication error occurs.
    async fn get_info(&self) -> Result<DeviceInfo>;
}

/// Angle output of a hobby servo (PWM channel).
///
/// Writes are immediate; pacing of a sweep is up to the caller.
pub trait ServoOutput: Send + Sync {
    /// Enable the PWM signal.
    fn attach(&mut self) -> Result<()>;

    /// Command an angle in degrees.
    fn write_angle(&mut self, degrees: u8) -> Result<()>;

    /// Disable the PWM signal so the servo stops holding torque.
    fn detach(&mut self);

    /// Angle measured by a feedback line, when the servo has one.
    fn feedback_angle(&self) -> Option<u8> {
        None
    }
}

/// Single digital input line (clearance sensor under the barrier).
pub trait DigitalInput: Send + Sync {
    /// Read the current level.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be read.
    async fn read_level(&self) -> Result<LineLevel>;
}

/// Bank of indexed digital input lines (slot sensors on an I/O expander).
pub trait InputBank: Send + Sync {
    /// Number of lines in the bank.
    fn line_count(&self) -> usize;

    /// Read line `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `index` is outside the bank
    /// - The bus transaction fails
    async fn read_line(&self, index: usize) -> Result<LineLevel>;
}
