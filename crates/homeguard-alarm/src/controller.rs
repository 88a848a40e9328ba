//! Alarm and mode controllers.
//!
//! Every state transition runs inside one [`SharedState::update`] call, with
//! the indicator switched in the same critical section so the LED always
//! matches `alarm_active`. Notifications go out after the lock is released.

use crate::notifier::{AlertEvent, ModeAction, Notifier};
use crate::store::SharedState;
use chrono::Utc;
use homeguard_core::constants::{DESCRIPTION_DISTANCE, DESCRIPTION_MOTION};
use homeguard_core::{SystemState, TagId, TriggerOutcome};
use homeguard_hardware::Indicator;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opens and closes alarm episodes.
#[derive(Clone)]
pub struct AlarmController {
    state: SharedState,
    indicator: Arc<dyn Indicator>,
    notifier: Arc<dyn Notifier>,
}

impl AlarmController {
    pub fn new(
        state: SharedState,
        indicator: Arc<dyn Indicator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            state,
            indicator,
            notifier,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Open an alarm episode for `reason`.
    ///
    /// Ignored while disarmed. While an episode is already open this is a
    /// no-op: the first reason is kept and nothing is dispatched.
    pub fn trigger(&self, reason: &str) -> TriggerOutcome {
        let now = Utc::now();
        let outcome = self.state.update(|s| {
            let outcome = s.open_alarm(reason, now);
            if outcome.is_raised() {
                self.switch_indicator(true);
            }
            outcome
        });

        match outcome {
            TriggerOutcome::Raised => {
                let description = Self::describe(reason);
                warn!(reason, description = %description, "Alarm raised");
                self.notifier.dispatch(AlertEvent::alarm(reason, description, now));
            }
            TriggerOutcome::AlreadyActive => debug!(reason, "Alarm already active"),
            TriggerOutcome::Disarmed => debug!(reason, "Trigger ignored while disarmed"),
        }
        outcome
    }

    /// Close the current episode, if any, and switch the indicator off.
    ///
    /// Returns whether an episode was open.
    pub fn reset(&self) -> bool {
        let was_active = self.state.update(|s| {
            let was_active = s.clear_alarm();
            self.switch_indicator(false);
            was_active
        });
        if was_active {
            info!("Alarm reset");
        }
        was_active
    }

    /// Human-readable description for an alarm reason.
    ///
    /// ```
    /// use homeguard_alarm::AlarmController;
    ///
    /// assert_eq!(AlarmController::describe("motion"), "Motion detected");
    /// assert_eq!(AlarmController::describe("distance<30cm"), "Front door");
    /// assert_eq!(AlarmController::describe("emergency"), "emergency");
    /// ```
    pub fn describe(reason: &str) -> String {
        if reason.contains("motion") {
            DESCRIPTION_MOTION.to_string()
        } else if reason.contains("distance") {
            DESCRIPTION_DISTANCE.to_string()
        } else {
            reason.to_string()
        }
    }

    /// Apply a mode decision and clear any alarm in one critical section.
    ///
    /// `decide` sees the state before the change and returns the new `armed`
    /// value.
    pub(crate) fn apply_mode(&self, decide: impl FnOnce(&mut SystemState) -> bool) -> bool {
        self.state.update(|s| {
            let armed = decide(s);
            s.set_mode(armed);
            self.switch_indicator(false);
            armed
        })
    }

    pub(crate) fn notify(&self, event: AlertEvent) {
        self.notifier.dispatch(event);
    }

    fn switch_indicator(&self, on: bool) {
        let result = if on {
            self.indicator.on()
        } else {
            self.indicator.off()
        };
        if let Err(e) = result {
            warn!(error = %e, on, "Failed to switch alarm indicator");
        }
    }
}

impl std::fmt::Debug for AlarmController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmController")
            .field("state", &self.state)
            .field("indicator_on", &self.indicator.is_on())
            .finish_non_exhaustive()
    }
}

/// Arms and disarms the system, from the control surface or a card tap.
#[derive(Debug, Clone)]
pub struct ModeController {
    alarm: AlarmController,
}

impl ModeController {
    pub fn new(alarm: AlarmController) -> Self {
        Self { alarm }
    }

    pub fn arm(&self) {
        self.set_mode(ModeAction::Arm);
    }

    pub fn disarm(&self) {
        self.set_mode(ModeAction::Disarm);
    }

    /// Handle a successful card read.
    ///
    /// An active alarm means the occupant is silencing it, so the system is
    /// disarmed; otherwise it is armed. The tag is recorded and the mode
    /// applied in one critical section. Dispatches the mode change, then the
    /// card event.
    pub fn card_toggle(&self, tag: TagId) -> ModeAction {
        let now = Utc::now();
        let armed = self.alarm.apply_mode(|s| {
            let disarm = s.alarm_active;
            s.record_tag(tag, now);
            !disarm
        });

        let action = ModeAction::from_armed(armed);
        info!(%tag, %action, "Card toggled mode");
        self.alarm.notify(AlertEvent::mode_change(action, now));
        self.alarm.notify(AlertEvent::rfid(tag, now));
        action
    }

    fn set_mode(&self, action: ModeAction) {
        let armed = action == ModeAction::Arm;
        self.alarm.apply_mode(|_| armed);
        info!(%action, "Mode changed");
        self.alarm.notify(AlertEvent::mode_change(action, Utc::now()));
    }
}
