//! Enum wrappers for sensor dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn MotionSensor>`
//! is not an option. These enums give the monitor loops one concrete type per
//! sensor family while still letting the daemon pick mock or GPIO drivers at
//! startup.
//!
//! # Examples
//!
//! ```
//! use homeguard_hardware::devices::AnyMotionSensor;
//! use homeguard_hardware::mock::MockMotionSensor;
//!
//! let (sensor, _handle) = MockMotionSensor::new();
//! let any_sensor = AnyMotionSensor::Mock(sensor);
//! ```

#[cfg(feature = "gpio")]
use crate::gpio::{GpioCardReader, GpioDistanceSensor, GpioMotionSensor};
use crate::mock::{MockCardReader, MockDistanceSensor, MockMotionSensor};
use crate::traits::{CardReader, DistanceSensor, MotionSensor};
use crate::{CardRead, DeviceInfo, Result};

/// Enum wrapper for motion sensor dispatch.
#[non_exhaustive]
pub enum AnyMotionSensor {
    /// Mock sensor for development and testing.
    Mock(MockMotionSensor),
    /// PIR module on a Raspberry Pi input pin.
    #[cfg(feature = "gpio")]
    Gpio(GpioMotionSensor),
}

impl MotionSensor for AnyMotionSensor {
    async fn wait_for_presence(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.wait_for_presence().await,
            #[cfg(feature = "gpio")]
            Self::Gpio(device) => device.wait_for_presence().await,
        }
    }

    async fn wait_for_absence(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.wait_for_absence().await,
            #[cfg(feature = "gpio")]
            Self::Gpio(device) => device.wait_for_absence().await,
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.get_info().await,
            #[cfg(feature = "gpio")]
            Self::Gpio(device) => device.get_info().await,
        }
    }
}

/// Enum wrapper for distance sensor dispatch.
#[non_exhaustive]
pub enum AnyDistanceSensor {
    /// Mock sensor for development and testing.
    Mock(MockDistanceSensor),
    /// HC-SR04 on a Raspberry Pi trigger/echo pair.
    #[cfg(feature = "gpio")]
    Gpio(GpioDistanceSensor),
}

impl DistanceSensor for AnyDistanceSensor {
    async fn read_distance(&mut self) -> Result<f64> {
        match self {
            Self::Mock(device) => device.read_distance().await,
            #[cfg(feature = "gpio")]
            Self::Gpio(device) => device.read_distance().await,
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.get_info().await,
            #[cfg(feature = "gpio")]
            Self::Gpio(device) => device.get_info().await,
        }
    }
}

/// Enum wrapper for card reader dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCardReader {
    /// Mock reader for development and testing.
    Mock(MockCardReader),
    /// MFRC522 on the Raspberry Pi SPI bus.
    #[cfg(feature = "gpio")]
    Gpio(GpioCardReader),
}

impl CardReader for AnyCardReader {
    async fn read_tag(&mut self) -> Result<CardRead> {
        match self {
            Self::Mock(device) => device.read_tag().await,
            #[cfg(feature = "gpio")]
            Self::Gpio(device) => device.read_tag().await,
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.get_info().await,
            #[cfg(feature = "gpio")]
            Self::Gpio(device) => device.get_info().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeguard_core::TagId;

    #[tokio::test]
    async fn test_any_motion_dispatches_to_mock() {
        let (sensor, handle) = MockMotionSensor::new();
        let mut any = AnyMotionSensor::Mock(sensor);

        handle.set_present(true);
        any.wait_for_presence().await.unwrap();
        assert_eq!(any.get_info().await.unwrap().model, "Mock");
    }

    #[tokio::test]
    async fn test_any_distance_dispatches_to_mock() {
        let (sensor, _handle) = MockDistanceSensor::new(0.42);
        let mut any = AnyDistanceSensor::Mock(sensor);
        assert_eq!(any.read_distance().await.unwrap(), 0.42);
    }

    #[tokio::test]
    async fn test_any_card_dispatches_to_mock() {
        let (reader, handle) = MockCardReader::new();
        let mut any = AnyCardReader::Mock(reader);

        handle.present_tag(TagId::new(7), "x").await.unwrap();
        assert_eq!(any.read_tag().await.unwrap().tag, TagId::new(7));
    }
}
