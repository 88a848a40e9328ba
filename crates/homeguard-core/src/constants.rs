//! Default tuning values for the monitor loops and the alarm.
//!
//! Every value here can be overridden through the daemon configuration; these
//! are the values the appliance ships with.
//!
//! ```
//! use homeguard_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(DEFAULT_DISTANCE_THRESHOLD_CM, 30.0);
//! let poll = Duration::from_millis(DEFAULT_DISTANCE_POLL_MS);
//! assert_eq!(poll.as_millis(), 200);
//! ```

// ============================================================================
// Alarm
// ============================================================================

/// Distance at or below which an armed system raises an alarm, in centimeters.
pub const DEFAULT_DISTANCE_THRESHOLD_CM: f64 = 30.0;

/// Reason recorded when the motion sensor raises the alarm.
pub const REASON_MOTION: &str = "motion";

/// Reason recorded when an operator requests an emergency alarm.
pub const REASON_EMERGENCY: &str = "emergency";

/// Description sent for alarms whose reason mentions motion.
pub const DESCRIPTION_MOTION: &str = "Motion detected";

/// Description sent for alarms whose reason mentions distance.
pub const DESCRIPTION_DISTANCE: &str = "Front door";

// ============================================================================
// Monitor loop timing (milliseconds)
// ============================================================================

/// Interval between two distance readings.
pub const DEFAULT_DISTANCE_POLL_MS: u64 = 200;

/// Pause after each card read attempt, successful or not.
pub const DEFAULT_CARD_RETRY_MS: u64 = 300;

/// Back-off applied after a motion or distance sensor error.
pub const DEFAULT_SENSOR_RETRY_MS: u64 = 300;

/// Time the supervisor waits for monitor tasks to stop before aborting them.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2000;

// ============================================================================
// Notification
// ============================================================================

/// Timeout for a single outbound alert POST.
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 3000;

/// Alert endpoint used when nothing is configured.
pub const DEFAULT_ALERT_URL: &str = "http://127.0.0.1:5000/api/events";
