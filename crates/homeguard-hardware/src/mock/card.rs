//! Mock proximity card reader for testing and development.
//!
//! Cards are queued through a [`MockCardHandle`]; each queued entry is either
//! a successful read or a read failure, delivered in order.

use crate::{
    HardwareError, Result,
    traits::CardReader,
    types::{CardRead, DeviceInfo},
};
use homeguard_core::TagId;
use tokio::sync::mpsc;

/// Simulated MFRC522-style reader.
///
/// # Examples
///
/// ```
/// use homeguard_hardware::mock::MockCardReader;
/// use homeguard_hardware::traits::CardReader;
/// use homeguard_core::TagId;
///
/// #[tokio::main]
/// async fn main() -> homeguard_hardware::Result<()> {
///     let (mut reader, handle) = MockCardReader::new();
///
///     handle.present_tag(TagId::new(584190412), "front door key").await?;
///
///     let read = reader.read_tag().await?;
///     assert_eq!(read.tag, TagId::new(584190412));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockCardReader {
    event_rx: mpsc::Receiver<CardEvent>,
    name: String,
}

impl MockCardReader {
    pub fn new() -> (Self, MockCardHandle) {
        Self::with_name("Mock RFID Reader".to_string())
    }

    pub fn with_name(name: String) -> (Self, MockCardHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        (Self { event_rx, name }, MockCardHandle { event_tx })
    }
}

impl CardReader for MockCardReader {
    async fn read_tag(&mut self) -> Result<CardRead> {
        let event = self
            .event_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected(self.name.clone()))?;

        match event {
            CardEvent::Presented(read) => Ok(read),
            CardEvent::Failed(message) => Err(HardwareError::card_read(message)),
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock"))
    }
}

#[derive(Debug, Clone)]
enum CardEvent {
    Presented(CardRead),
    Failed(String),
}

/// Handle for controlling a [`MockCardReader`].
#[derive(Debug, Clone)]
pub struct MockCardHandle {
    event_tx: mpsc::Sender<CardEvent>,
}

impl MockCardHandle {
    /// Queue a successful read of `tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn present_tag(&self, tag: TagId, payload: impl Into<String>) -> Result<()> {
        self.send(CardEvent::Presented(CardRead::new(tag, payload)))
            .await
    }

    /// Queue a failed read.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn fail_read(&self, message: impl Into<String>) -> Result<()> {
        self.send(CardEvent::Failed(message.into())).await
    }

    async fn send(&self, event: CardEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("RFID event channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_arrive_in_order() {
        let (mut reader, handle) = MockCardReader::new();

        handle.present_tag(TagId::new(1), "a").await.unwrap();
        handle.fail_read("AUTH ERROR").await.unwrap();
        handle.present_tag(TagId::new(2), "b").await.unwrap();

        assert_eq!(reader.read_tag().await.unwrap().tag, TagId::new(1));
        let err = reader.read_tag().await.unwrap_err();
        assert!(matches!(err, HardwareError::CardReadError { .. }));
        assert_eq!(reader.read_tag().await.unwrap().payload, "b");
    }

    #[tokio::test]
    async fn test_closed_channel_reports_disconnect() {
        let (mut reader, handle) = MockCardReader::new();
        drop(handle);

        assert!(reader.read_tag().await.unwrap_err().is_disconnect());
    }

    #[tokio::test]
    async fn test_present_after_reader_dropped() {
        let (reader, handle) = MockCardReader::new();
        drop(reader);

        let result = handle.present_tag(TagId::new(9), "").await;
        assert!(result.is_err());
    }
}
