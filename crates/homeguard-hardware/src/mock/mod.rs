//! Mock device implementations for testing and development.
//!
//! This module provides simulated devices that can be controlled
//! programmatically without requiring a Raspberry Pi.

pub mod card;
pub mod distance;
pub mod indicator;
pub mod motion;

pub use card::{MockCardHandle, MockCardReader};
pub use distance::{MockDistanceHandle, MockDistanceSensor};
pub use indicator::MockIndicator;
pub use motion::{MockMotionHandle, MockMotionSensor};
