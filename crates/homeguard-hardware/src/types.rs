//! Common types shared across device implementations.

use homeguard_core::TagId;
use serde::{Deserialize, Serialize};

/// Generic device information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "HC-SR501", "Mock PIR").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// BCM pin numbers the device is wired to, if any.
    pub pins: Vec<u8>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            pins: Vec::new(),
        }
    }

    /// Record the pins the device uses.
    pub fn with_pins(mut self, pins: impl Into<Vec<u8>>) -> Self {
        self.pins = pins.into();
        self
    }
}

/// One successful read from a proximity card reader.
///
/// The payload is whatever text the card carries; the alarm logic only
/// looks at the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRead {
    pub tag: TagId,
    pub payload: String,
}

impl CardRead {
    pub fn new(tag: impl Into<TagId>, payload: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            payload: payload.into(),
        }
    }
}
