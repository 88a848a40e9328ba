//! Mock motion sensor for testing and development.

use crate::{
    HardwareError, Result,
    traits::MotionSensor,
    types::DeviceInfo,
};
use tokio::sync::watch;

/// Simulated PIR sensor driven by a [`MockMotionHandle`].
///
/// # Examples
///
/// ```
/// use homeguard_hardware::mock::MockMotionSensor;
/// use homeguard_hardware::traits::MotionSensor;
///
/// #[tokio::main]
/// async fn main() -> homeguard_hardware::Result<()> {
///     let (mut sensor, handle) = MockMotionSensor::new();
///
///     handle.set_present(true);
///     sensor.wait_for_presence().await?;
///
///     handle.set_present(false);
///     sensor.wait_for_absence().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockMotionSensor {
    level_rx: watch::Receiver<bool>,
    name: String,
}

impl MockMotionSensor {
    /// Create a new mock sensor reporting absence.
    pub fn new() -> (Self, MockMotionHandle) {
        Self::with_name("Mock PIR".to_string())
    }

    pub fn with_name(name: String) -> (Self, MockMotionHandle) {
        let (level_tx, level_rx) = watch::channel(false);
        (Self { level_rx, name }, MockMotionHandle { level_tx })
    }

    async fn wait_for_level(&mut self, present: bool) -> Result<()> {
        self.level_rx
            .wait_for(|level| *level == present)
            .await
            .map(|_| ())
            .map_err(|_| HardwareError::disconnected(self.name.clone()))
    }
}

impl MotionSensor for MockMotionSensor {
    async fn wait_for_presence(&mut self) -> Result<()> {
        self.wait_for_level(true).await
    }

    async fn wait_for_absence(&mut self) -> Result<()> {
        self.wait_for_level(false).await
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock"))
    }
}

/// Handle for controlling a [`MockMotionSensor`].
///
/// Dropping every handle disconnects the sensor.
#[derive(Debug, Clone)]
pub struct MockMotionHandle {
    level_tx: watch::Sender<bool>,
}

impl MockMotionHandle {
    /// Set the level the sensor reports.
    pub fn set_present(&self, present: bool) {
        self.level_tx.send_replace(present);
    }

    pub fn is_present(&self) -> bool {
        *self.level_tx.borrow()
    }
}
