//! Homeguard appliance daemon.
//!
//! Loads [`config::Config`], builds the configured hardware backend, starts
//! the monitor loops and serves the control API until asked to stop.

pub mod app;
pub mod config;
pub mod hardware;

pub use app::Appliance;
pub use config::{Config, ConfigError};
