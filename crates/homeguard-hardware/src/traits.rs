//! Device trait definitions.
//!
//! These traits are the contract between the monitor loops and the physical
//! sensors. Input devices use native `async fn` methods (Edition 2024 RPITIT);
//! see [`devices`](crate::devices) for the enum wrappers that make them usable
//! from spawned tasks. The indicator is synchronous and object-safe because it
//! is switched from inside the shared-state critical section.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{CardRead, DeviceInfo};

/// Binary presence sensor (e.g. a PIR module).
///
/// Both waits are level-triggered: if the sensor already reports the awaited
/// level the call returns immediately.
///
/// # Examples
///
/// ```no_run
/// use homeguard_hardware::traits::MotionSensor;
/// use homeguard_hardware::Result;
///
/// async fn count_visits<M: MotionSensor>(sensor: &mut M, visits: usize) -> Result<()> {
///     for _ in 0..visits {
///         sensor.wait_for_presence().await?;
///         sensor.wait_for_absence().await?;
///     }
///     Ok(())
/// }
/// ```
pub trait MotionSensor: Send + Sync {
    /// Block until the sensor reports presence.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or cannot be read.
    async fn wait_for_presence(&mut self) -> Result<()>;

    /// Block until the sensor reports absence.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or cannot be read.
    async fn wait_for_absence(&mut self) -> Result<()>;

    /// Get device information.
    async fn get_info(&self) -> Result<DeviceInfo>;
}

/// Polled range sensor (e.g. an HC-SR04 ultrasonic module).
pub trait DistanceSensor: Send + Sync {
    /// Take one reading, in meters.
    ///
    /// # Errors
    ///
    /// Returns an error if no echo arrives or the device cannot be read.
    async fn read_distance(&mut self) -> Result<f64>;

    /// Get device information.
    async fn get_info(&self) -> Result<DeviceInfo>;
}

/// Proximity card reader (e.g. an MFRC522 module).
pub trait CardReader: Send + Sync {
    /// Block until a card is presented and read.
    ///
    /// # Errors
    ///
    /// Read failures are expected (card pulled away, bad auth) and callers
    /// should simply try again after a short delay.
    async fn read_tag(&mut self) -> Result<CardRead>;

    /// Get device information.
    async fn get_info(&self) -> Result<DeviceInfo>;
}

/// Physical alarm indicator (e.g. an LED).
///
/// Implementations must be cheap: these calls run while the shared state
/// lock is held.
pub trait Indicator: Send + Sync {
    /// Switch the indicator on.
    ///
    /// # Errors
    ///
    /// Returns an error if the output pin cannot be driven.
    fn on(&self) -> Result<()>;

    /// Switch the indicator off.
    ///
    /// # Errors
    ///
    /// Returns an error if the output pin cannot be driven.
    fn off(&self) -> Result<()>;

    /// Last level written.
    fn is_on(&self) -> bool;
}
