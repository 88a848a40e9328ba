//! Sensor and output abstractions for the homeguard appliance.
//!
//! This crate defines the contracts the monitor loops rely on: a binary
//! motion sensor, a polled distance sensor, a proximity card reader, and an
//! indicator output. Mock implementations make the whole alarm pipeline
//! testable off-device; the `gpio` feature adds Raspberry Pi drivers.
//!
//! # Design
//!
//! - **Async inputs**: sensor waits and reads are native `async fn` in traits.
//! - **Enum dispatch**: [`devices`] wraps each sensor family in an enum so the
//!   loops can be spawned as concrete, `Send` tasks.
//! - **Sync output**: [`Indicator`] is object-safe and non-blocking so it can be
//!   switched while the shared state lock is held.
//!
//! # Example
//!
//! ```no_run
//! use homeguard_hardware::traits::{DistanceSensor, MotionSensor};
//! use homeguard_hardware::Result;
//!
//! async fn watch<M: MotionSensor, D: DistanceSensor>(pir: &mut M, ranger: &mut D) -> Result<f64> {
//!     pir.wait_for_presence().await?;
//!     ranger.read_distance().await
//! }
//! ```

pub mod devices;
pub mod error;
#[cfg(feature = "gpio")]
pub mod gpio;
pub mod mfrc522;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use traits::{CardReader, DistanceSensor, Indicator, MotionSensor};
pub use types::{CardRead, DeviceInfo};

pub use devices::{AnyCardReader, AnyDistanceSensor, AnyMotionSensor};
