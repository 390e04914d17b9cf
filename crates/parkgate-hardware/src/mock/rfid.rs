//! Mock RFID reader implementation for testing and development.
//!
//! This module provides a simulated lane reader that can be controlled
//! programmatically for testing without requiring physical hardware.

use crate::{
    Result,
    traits::{CardData, CardType, IdentityReader},
    types::ReaderInfo,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Mock RFID reader for testing and development.
///
/// Cards presented through the [`MockRfidHandle`] are queued and returned
/// one per `poll_card` call.
///
/// # Examples
///
/// ```
/// use parkgate_hardware::mock::MockRfid;
/// use parkgate_hardware::traits::IdentityReader;
///
/// #[tokio::main]
/// async fn main() -> parkgate_hardware::Result<()> {
///     let (mut reader, handle) = MockRfid::new();
///
///     assert!(reader.poll_card().await?.is_none());
///
///     handle.present_card(vec![0x04, 0xAB, 0xCD, 0xEF]).await?;
///     let card = reader.poll_card().await?.unwrap();
///     assert_eq!(card.uid_hex(), "04ABCDEF");
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockRfid {
    /// Channel receiver for presented cards
    event_rx: mpsc::Receiver<CardData>,

    /// Device name
    name: String,

    /// Number of halt requests received
    halts: Arc<AtomicUsize>,
}

impl MockRfid {
    /// Create a new mock RFID reader with the default name.
    ///
    /// Returns a tuple of (MockRfid, MockRfidHandle) where the handle
    /// can be used to simulate card presentations.
    pub fn new() -> (Self, MockRfidHandle) {
        Self::with_name("Mock RFID Reader".to_string())
    }

    /// Create a new mock RFID reader with a custom name.
    pub fn with_name(name: String) -> (Self, MockRfidHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let halts = Arc::new(AtomicUsize::new(0));

        let reader = Self {
            event_rx,
            name,
            halts: halts.clone(),
        };

        let handle = MockRfidHandle { event_tx, halts };

        (reader, handle)
    }
}

impl Default for MockRfid {
    fn default() -> Self {
        Self::new().0
    }
}

impl IdentityReader for MockRfid {
    async fn poll_card(&mut self) -> Result<Option<CardData>> {
        match self.event_rx.try_recv() {
            Ok(card) => Ok(Some(card)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(crate::HardwareError::disconnected(
                "RFID event channel closed",
            )),
        }
    }

    async fn halt(&mut self) -> Result<()> {
        self.halts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_reader_info(&self) -> Result<ReaderInfo> {
        Ok(ReaderInfo::new(
            self.name.clone(),
            vec!["ISO14443A".to_string()],
        ))
    }
}

/// Handle for controlling a mock RFID reader.
#[derive(Debug, Clone)]
pub struct MockRfidHandle {
    /// Channel sender for presented cards
    event_tx: mpsc::Sender<CardData>,

    /// Halt counter shared with the reader
    halts: Arc<AtomicUsize>,
}

impl MockRfidHandle {
    /// Present a Mifare Classic 1K card with the given UID.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The UID is not 4-10 bytes long
    /// - The reader has been dropped and the channel is closed
    pub async fn present_card(&self, uid: Vec<u8>) -> Result<()> {
        let card = CardData::new(uid, CardType::MifareClassic1K)?;
        self.present(card).await
    }

    /// Present an already built card.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn present(&self, card: CardData) -> Result<()> {
        self.event_tx
            .send(card)
            .await
            .map_err(|_| crate::HardwareError::disconnected("RFID event channel closed"))
    }

    /// Number of times the reader halted a card.
    pub fn halt_count(&self) -> usize {
        self.halts.load(Ordering::SeqCst)
    }
}
