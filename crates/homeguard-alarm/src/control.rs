//! Operator commands.
//!
//! [`ControlSurface`] is what the HTTP layer talks to. It maps each
//! [`Command`] onto the controllers and answers with an [`Ack`].

use crate::controller::{AlarmController, ModeController};
use homeguard_core::constants::REASON_EMERGENCY;
use homeguard_core::{Command, SystemState, TriggerOutcome};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Reply to a control command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Operator-facing entry point for arm/disarm/reset/emergency and status.
///
/// # Examples
///
/// ```
/// use homeguard_alarm::{AlarmController, ControlSurface, RecordingNotifier, SharedState};
/// use homeguard_core::Command;
/// use homeguard_hardware::mock::MockIndicator;
/// use std::sync::Arc;
///
/// let alarm = AlarmController::new(
///     SharedState::default(),
///     Arc::new(MockIndicator::new()),
///     Arc::new(RecordingNotifier::new()),
/// );
/// let control = ControlSurface::new(alarm);
///
/// let ack = control.execute(Command::Emergency);
/// assert!(ack.success);
/// assert!(control.status().alarm_active);
/// ```
#[derive(Debug, Clone)]
pub struct ControlSurface {
    alarm: AlarmController,
    mode: ModeController,
}

impl ControlSurface {
    pub fn new(alarm: AlarmController) -> Self {
        Self {
            mode: ModeController::new(alarm.clone()),
            alarm,
        }
    }

    pub fn alarm(&self) -> &AlarmController {
        &self.alarm
    }

    pub fn mode(&self) -> &ModeController {
        &self.mode
    }

    pub fn execute(&self, command: Command) -> Ack {
        info!(%command, "Control command");
        match command {
            Command::Arm => {
                self.mode.arm();
                Ack::ok("System armed")
            }
            Command::Disarm => {
                self.mode.disarm();
                Ack::ok("System disarmed")
            }
            Command::Reset => {
                self.alarm.reset();
                Ack::ok("Alarm reset")
            }
            Command::Emergency => self.emergency(),
        }
    }

    /// Atomic copy of the shared state.
    pub fn status(&self) -> SystemState {
        self.alarm.state().snapshot()
    }

    // Emergency goes through the same armed gate as the sensors.
    fn emergency(&self) -> Ack {
        match self.alarm.trigger(REASON_EMERGENCY) {
            TriggerOutcome::Raised => Ack::ok("Emergency alarm triggered"),
            TriggerOutcome::AlreadyActive => Ack::ok("Emergency noted, alarm already active"),
            TriggerOutcome::Disarmed => {
                warn!("Emergency ignored while system is disarmed");
                Ack::ok("Emergency ignored, system is disarmed")
            }
        }
    }
}
