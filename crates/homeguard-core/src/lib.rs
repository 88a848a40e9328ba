//! Shared domain types for the homeguard intrusion-detection appliance.
//!
//! This crate holds the pieces every other crate agrees on: the shared
//! [`SystemState`] record and its pure transitions, card tag identifiers,
//! control commands, and the default timing and threshold constants.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
