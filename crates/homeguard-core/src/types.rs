use crate::{
    Result,
    constants::{DEFAULT_DISTANCE_THRESHOLD_CM, REASON_EMERGENCY},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock instant, serialized as an RFC 3339 UTC string.
pub type Timestamp = DateTime<Utc>;

/// Identifier read from a proximity card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(u64);

impl TagId {
    pub const fn new(id: u64) -> Self {
        TagId(id)
    }

    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TagId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(TagId)
            .map_err(|_| Error::InvalidTagId(s.to_string()))
    }
}

impl From<u64> for TagId {
    fn from(id: u64) -> Self {
        TagId(id)
    }
}

/// Result of asking the state to open an alarm episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new episode was opened.
    Raised,
    /// The system is disarmed; nothing changed.
    Disarmed,
    /// An episode is already open; nothing changed.
    AlreadyActive,
}

impl TriggerOutcome {
    pub fn is_raised(&self) -> bool {
        matches!(self, Self::Raised)
    }
}

/// The single shared record of the appliance.
///
/// All mutation goes through the methods below so that the alarm fields
/// (`alarm_active`, `alarm_reason`, `alarm_since`) always move together.
/// Locking is the caller's concern; this type is plain data.
///
/// # Examples
///
/// ```
/// use homeguard_core::{SystemState, TriggerOutcome};
/// use chrono::Utc;
///
/// let mut state = SystemState::default();
/// assert!(state.armed);
///
/// assert_eq!(state.open_alarm("motion", Utc::now()), TriggerOutcome::Raised);
/// assert_eq!(state.open_alarm("emergency", Utc::now()), TriggerOutcome::AlreadyActive);
/// assert_eq!(state.alarm_reason.as_deref(), Some("motion"));
///
/// state.set_mode(false);
/// assert!(!state.alarm_active);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub armed: bool,

    pub motion_detected: bool,
    pub motion_last: Option<Timestamp>,

    pub distance_cm: Option<f64>,
    pub distance_last: Option<Timestamp>,

    pub last_tag: Option<TagId>,
    pub rfid_last: Option<Timestamp>,

    pub alarm_active: bool,
    pub alarm_reason: Option<String>,
    pub alarm_since: Option<Timestamp>,

    pub distance_threshold_cm: f64,
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE_THRESHOLD_CM)
    }
}

impl SystemState {
    /// Fresh state: armed, no readings, no alarm.
    pub fn new(distance_threshold_cm: f64) -> Self {
        Self {
            armed: true,
            motion_detected: false,
            motion_last: None,
            distance_cm: None,
            distance_last: None,
            last_tag: None,
            rfid_last: None,
            alarm_active: false,
            alarm_reason: None,
            alarm_since: None,
            distance_threshold_cm,
        }
    }

    /// Open an alarm episode unless disarmed or one is already open.
    ///
    /// The first reason of an episode is kept; later triggers never overwrite it.
    pub fn open_alarm(&mut self, reason: &str, at: Timestamp) -> TriggerOutcome {
        if !self.armed {
            return TriggerOutcome::Disarmed;
        }
        if self.alarm_active {
            return TriggerOutcome::AlreadyActive;
        }

        self.alarm_active = true;
        self.alarm_reason = Some(reason.to_string());
        self.alarm_since = Some(at);
        TriggerOutcome::Raised
    }

    /// Close the current episode, if any. Returns whether one was open.
    pub fn clear_alarm(&mut self) -> bool {
        let was_active = self.alarm_active;
        self.alarm_active = false;
        self.alarm_reason = None;
        self.alarm_since = None;
        was_active
    }

    /// Switch armed mode. Any open episode is closed either way.
    pub fn set_mode(&mut self, armed: bool) {
        self.armed = armed;
        self.clear_alarm();
    }

    pub fn record_motion(&mut self, present: bool, at: Timestamp) {
        self.motion_detected = present;
        if present {
            self.motion_last = Some(at);
        }
    }

    pub fn record_distance(&mut self, distance_cm: f64, at: Timestamp) {
        self.distance_cm = Some(distance_cm);
        self.distance_last = Some(at);
    }

    pub fn record_tag(&mut self, tag: TagId, at: Timestamp) {
        self.last_tag = Some(tag);
        self.rfid_last = Some(at);
    }

    /// Whether a reading of `distance_cm` should raise the alarm right now.
    pub fn distance_triggers(&self, distance_cm: f64) -> bool {
        self.armed && distance_cm <= self.distance_threshold_cm
    }

    /// Reason string used for distance alarms, e.g. `distance<30cm`.
    pub fn distance_reason(&self) -> String {
        format!("distance<{}cm", self.distance_threshold_cm)
    }

    /// Verify the alarm fields are consistent with each other.
    ///
    /// # Errors
    /// Returns `Error::InvariantViolation` describing the first broken rule.
    pub fn check_invariants(&self) -> Result<()> {
        let reason = self.alarm_reason.is_some();
        let since = self.alarm_since.is_some();

        if self.alarm_active && !(reason && since) {
            return Err(Error::InvariantViolation(
                "active alarm without reason or start time".to_string(),
            ));
        }
        if !self.alarm_active && (reason || since) {
            return Err(Error::InvariantViolation(
                "inactive alarm with leftover reason or start time".to_string(),
            ));
        }
        if self.alarm_active && !self.armed {
            return Err(Error::InvariantViolation(
                "alarm active while disarmed".to_string(),
            ));
        }
        Ok(())
    }
}

/// Operator commands accepted by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Arm,
    Disarm,
    Reset,
    Emergency,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::Arm,
        Command::Disarm,
        Command::Reset,
        Command::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Arm => "arm",
            Command::Disarm => "disarm",
            Command::Reset => "reset",
            Command::Emergency => REASON_EMERGENCY,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn now() -> Timestamp {
        Utc::now()
    }

    #[test]
    fn test_new_state_is_armed_and_quiet() {
        let state = SystemState::new(30.0);
        assert!(state.armed);
        assert!(!state.alarm_active);
        assert!(state.alarm_reason.is_none());
        assert!(state.alarm_since.is_none());
        assert!(state.distance_cm.is_none());
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_open_alarm_when_disarmed_changes_nothing() {
        let mut state = SystemState::default();
        state.set_mode(false);
        let before = state.clone();

        assert_eq!(state.open_alarm("motion", now()), TriggerOutcome::Disarmed);
        assert_eq!(state, before);
    }

    #[test]
    fn test_open_alarm_keeps_first_reason() {
        let mut state = SystemState::default();
        let first = now();
        assert!(state.open_alarm("motion", first).is_raised());

        let outcome = state.open_alarm("distance<30cm", now());
        assert_eq!(outcome, TriggerOutcome::AlreadyActive);
        assert_eq!(state.alarm_reason.as_deref(), Some("motion"));
        assert_eq!(state.alarm_since, Some(first));
    }

    #[test]
    fn test_clear_alarm_reports_previous_state() {
        let mut state = SystemState::default();
        assert!(!state.clear_alarm());

        state.open_alarm("motion", now());
        assert!(state.clear_alarm());
        assert!(state.check_invariants().is_ok());
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_set_mode_always_clears_alarm(#[case] armed: bool) {
        let mut state = SystemState::default();
        state.open_alarm("emergency", now());

        state.set_mode(armed);
        assert_eq!(state.armed, armed);
        assert!(!state.alarm_active);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_record_motion_stamps_only_presence() {
        let mut state = SystemState::default();
        let t = now();
        state.record_motion(true, t);
        assert!(state.motion_detected);
        assert_eq!(state.motion_last, Some(t));

        state.record_motion(false, now());
        assert!(!state.motion_detected);
        assert_eq!(state.motion_last, Some(t));
    }

    #[rstest]
    #[case(30.0, true)]
    #[case(30.1, false)]
    #[case(10.0, true)]
    #[case(0.0, true)]
    #[case(250.0, false)]
    fn test_distance_threshold_boundary(#[case] reading: f64, #[case] triggers: bool) {
        let state = SystemState::new(30.0);
        assert_eq!(state.distance_triggers(reading), triggers);
    }

    #[test]
    fn test_distance_never_triggers_when_disarmed() {
        let mut state = SystemState::new(30.0);
        state.set_mode(false);
        assert!(!state.distance_triggers(10.0));
    }

    #[test]
    fn test_distance_reason_format() {
        assert_eq!(SystemState::new(30.0).distance_reason(), "distance<30cm");
        assert_eq!(SystemState::new(12.5).distance_reason(), "distance<12.5cm");
    }

    #[test]
    fn test_invariant_violation_detected() {
        let mut state = SystemState::default();
        state.alarm_active = true;
        assert!(matches!(
            state.check_invariants(),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_state_serializes_iso_timestamps() {
        let mut state = SystemState::default();
        state.open_alarm("motion", now());
        state.record_tag(TagId::new(584190412), now());

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["alarm_reason"], "motion");
        assert_eq!(json["last_tag"], 584190412u64);
        let since = json["alarm_since"].as_str().unwrap();
        assert!(since.parse::<Timestamp>().is_ok());
        assert!(json["distance_cm"].is_null());
    }

    #[rstest]
    #[case("arm", Command::Arm)]
    #[case("DISARM", Command::Disarm)]
    #[case(" reset ", Command::Reset)]
    #[case("emergency", Command::Emergency)]
    fn test_command_from_str(#[case] input: &str, #[case] expected: Command) {
        assert_eq!(input.parse::<Command>().unwrap(), expected);
    }

    #[test]
    fn test_command_unknown() {
        assert_eq!(
            "panic".parse::<Command>(),
            Err(Error::UnknownCommand("panic".to_string()))
        );
    }

    #[test]
    fn test_tag_id_parse_and_display() {
        let tag: TagId = "1234567890".parse().unwrap();
        assert_eq!(tag.as_u64(), 1234567890);
        assert_eq!(tag.to_string(), "1234567890");
        assert!("not-a-tag".parse::<TagId>().is_err());
    }
}
