//! Device construction for the configured backend.

use crate::config::{Backend, HardwareConfig};
use homeguard_hardware::devices::{AnyCardReader, AnyDistanceSensor, AnyMotionSensor};
use homeguard_hardware::mock::{
    MockCardHandle, MockCardReader, MockDistanceHandle, MockDistanceSensor, MockIndicator,
    MockMotionHandle, MockMotionSensor,
};
use homeguard_hardware::{HardwareError, Indicator};
use std::sync::Arc;
use tracing::info;

/// Control ends of the mock devices.
///
/// Dropping a handle closes its device's channel, so these live as long as
/// the appliance does. All `None` on the GPIO backend.
#[derive(Debug, Default)]
pub struct MockHandles {
    pub motion: Option<MockMotionHandle>,
    pub distance: Option<MockDistanceHandle>,
    pub card: Option<MockCardHandle>,
}

/// Everything the monitors and the alarm controller need.
pub struct Devices {
    pub motion: AnyMotionSensor,
    pub distance: AnyDistanceSensor,
    pub card: AnyCardReader,
    pub indicator: Arc<dyn Indicator>,
    pub mocks: MockHandles,
}

/// Build the devices for `config.backend`.
pub fn build(config: &HardwareConfig) -> Result<Devices, HardwareError> {
    match config.backend {
        Backend::Mock => {
            info!("Using mock hardware backend");
            let (motion, motion_handle) = MockMotionSensor::new();
            // Start out of range so the idle mock never raises an alarm.
            let (distance, distance_handle) = MockDistanceSensor::new(config.max_distance_m);
            let (card, card_handle) = MockCardReader::new();

            Ok(Devices {
                motion: AnyMotionSensor::Mock(motion),
                distance: AnyDistanceSensor::Mock(distance),
                card: AnyCardReader::Mock(card),
                indicator: Arc::new(MockIndicator::new()),
                mocks: MockHandles {
                    motion: Some(motion_handle),
                    distance: Some(distance_handle),
                    card: Some(card_handle),
                },
            })
        }
        Backend::Gpio => build_gpio(config),
    }
}

#[cfg(feature = "gpio")]
fn build_gpio(config: &HardwareConfig) -> Result<Devices, HardwareError> {
    use homeguard_hardware::gpio::{
        GpioCardReader, GpioDistanceSensor, GpioIndicator, GpioMotionSensor,
    };

    info!("Using GPIO hardware backend");
    Ok(Devices {
        motion: AnyMotionSensor::Gpio(GpioMotionSensor::new(config.pir_pin)?),
        distance: AnyDistanceSensor::Gpio(GpioDistanceSensor::new(
            config.trigger_pin,
            config.echo_pin,
            config.max_distance_m,
        )?),
        card: AnyCardReader::Gpio(GpioCardReader::new(config.card_reset_pin)?),
        indicator: Arc::new(GpioIndicator::new(config.led_pin)?),
        mocks: MockHandles::default(),
    })
}

#[cfg(not(feature = "gpio"))]
fn build_gpio(_config: &HardwareConfig) -> Result<Devices, HardwareError> {
    Err(HardwareError::unsupported(
        "gpio backend (rebuild with --features gpio)",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeguard_hardware::traits::DistanceSensor;

    #[tokio::test]
    async fn test_mock_backend_starts_out_of_range() {
        let mut devices = build(&HardwareConfig::default()).unwrap();
        assert_eq!(devices.distance.read_distance().await.unwrap(), 4.0);
        assert!(!devices.indicator.is_on());
        assert!(devices.mocks.motion.is_some());
        assert!(devices.mocks.card.is_some());
    }

    #[cfg(not(feature = "gpio"))]
    #[test]
    fn test_gpio_backend_requires_feature() {
        let config = HardwareConfig {
            backend: Backend::Gpio,
            ..HardwareConfig::default()
        };
        let err = build(&config).err().unwrap();
        assert!(matches!(err, HardwareError::Unsupported { .. }));
    }
}
