//! Alarm logic for the homeguard appliance.
//!
//! - [`store`]: the single shared [`SystemState`](homeguard_core::SystemState).
//! - [`controller`]: opening and closing alarm episodes, arming and disarming.
//! - [`control`]: operator commands and status.
//! - [`monitor`]: one supervised task per sensor.
//! - [`notifier`]: outbound alert events.
//!
//! Nothing here performs network I/O; the HTTP notifier and control routes
//! live in `homeguard-network`.

pub mod control;
pub mod controller;
pub mod monitor;
pub mod notifier;
pub mod store;

pub use control::{Ack, ControlSurface};
pub use controller::{AlarmController, ModeController};
pub use monitor::{MonitorConfig, MonitorHandle, MonitorSupervisor, ShutdownReport};
pub use notifier::{AlertEvent, ModeAction, Notifier, NullNotifier, RecordingNotifier};
pub use store::SharedState;
