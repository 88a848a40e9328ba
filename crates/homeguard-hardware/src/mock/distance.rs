//! Mock distance sensor for testing and development.

use crate::{HardwareError, Result, traits::DistanceSensor, types::DeviceInfo};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Value a mock reading resolves to: meters, or a failure message.
type Reading = std::result::Result<f64, String>;

/// Simulated ultrasonic ranger.
///
/// Every call to `read_distance` returns whatever the handle last set, so a
/// test can hold a reading steady across several polls.
///
/// # Examples
///
/// ```
/// use homeguard_hardware::mock::MockDistanceSensor;
/// use homeguard_hardware::traits::DistanceSensor;
///
/// #[tokio::main]
/// async fn main() -> homeguard_hardware::Result<()> {
///     let (mut sensor, handle) = MockDistanceSensor::new(2.0);
///     assert_eq!(sensor.read_distance().await?, 2.0);
///
///     handle.set_meters(0.25);
///     assert_eq!(sensor.read_distance().await?, 0.25);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockDistanceSensor {
    reading_rx: watch::Receiver<Reading>,
    reads: Arc<AtomicU64>,
    name: String,
}

impl MockDistanceSensor {
    /// Create a new mock sensor starting at `meters`.
    pub fn new(meters: f64) -> (Self, MockDistanceHandle) {
        let (reading_tx, reading_rx) = watch::channel(Ok(meters));
        let reads = Arc::new(AtomicU64::new(0));

        let sensor = Self {
            reading_rx,
            reads: Arc::clone(&reads),
            name: "Mock HC-SR04".to_string(),
        };
        (sensor, MockDistanceHandle { reading_tx, reads })
    }
}

impl DistanceSensor for MockDistanceSensor {
    async fn read_distance(&mut self) -> Result<f64> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.reading_rx
            .borrow()
            .clone()
            .map_err(HardwareError::communication)
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock"))
    }
}

/// Handle for controlling a [`MockDistanceSensor`].
#[derive(Debug, Clone)]
pub struct MockDistanceHandle {
    reading_tx: watch::Sender<Reading>,
    reads: Arc<AtomicU64>,
}

impl MockDistanceHandle {
    /// Report `meters` from now on.
    pub fn set_meters(&self, meters: f64) {
        self.reading_tx.send_replace(Ok(meters));
    }

    /// Make every read fail with `message` until a distance is set again.
    pub fn fail(&self, message: impl Into<String>) {
        self.reading_tx.send_replace(Err(message.into()));
    }

    /// Number of reads performed so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}
