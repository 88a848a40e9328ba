//! Sensor monitor loops and their supervisor.
//!
//! Each registered device gets its own task. The tasks share one
//! [`CancellationToken`]; every wait and sleep inside a loop races against it,
//! so shutdown does not depend on a sensor ever producing another reading.
//!
//! ```text
//! ┌──────────┐  presence/absence   ┌──────────────┐
//! │ Motion   │────────────────────►│              │
//! │ Task     │                     │ SharedState  │──► AlarmController ──► Notifier
//! └──────────┘                     │              │                   └─► Indicator
//! ┌──────────┐  poll every 200ms   │              │
//! │ Distance │────────────────────►│              │
//! │ Task     │                     └──────────────┘
//! └──────────┘                            ▲
//! ┌──────────┐  card read                 │
//! │ Card     │──────► ModeController ─────┘
//! │ Task     │
//! └──────────┘
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use homeguard_alarm::monitor::{MonitorConfig, MonitorSupervisor};
//! use homeguard_alarm::{AlarmController, NullNotifier, SharedState};
//! use homeguard_hardware::devices::AnyMotionSensor;
//! use homeguard_hardware::mock::{MockIndicator, MockMotionSensor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let alarm = AlarmController::new(
//!         SharedState::default(),
//!         Arc::new(MockIndicator::new()),
//!         Arc::new(NullNotifier),
//!     );
//!
//!     let mut supervisor = MonitorSupervisor::new(MonitorConfig::default(), alarm);
//!     let (pir, _pir_handle) = MockMotionSensor::new();
//!     supervisor.register_motion(AnyMotionSensor::Mock(pir));
//!
//!     let handle = supervisor.start();
//!     // ... run until asked to stop ...
//!     let report = handle.shutdown(Duration::from_secs(2)).await;
//!     assert!(report.is_clean());
//! }
//! ```

use crate::controller::{AlarmController, ModeController};
use chrono::Utc;
use homeguard_core::constants::{
    DEFAULT_CARD_RETRY_MS, DEFAULT_DISTANCE_POLL_MS, DEFAULT_SENSOR_RETRY_MS, REASON_MOTION,
};
use homeguard_hardware::devices::{AnyCardReader, AnyDistanceSensor, AnyMotionSensor};
use homeguard_hardware::traits::{CardReader, DistanceSensor, MotionSensor};
use std::future::Future;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Convert a ranger reading in meters to centimeters, rounded to 0.1 cm.
///
/// ```
/// use homeguard_alarm::monitor::meters_to_cm;
///
/// assert_eq!(meters_to_cm(0.3), 30.0);
/// assert_eq!(meters_to_cm(1.23456), 123.5);
/// ```
pub fn meters_to_cm(meters: f64) -> f64 {
    (meters * 100.0 * 10.0).round() / 10.0
}

/// The three monitor loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Monitor {
    Motion,
    Distance,
    Card,
}

impl std::fmt::Display for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Motion => write!(f, "motion"),
            Self::Distance => write!(f, "distance"),
            Self::Card => write!(f, "card"),
        }
    }
}

/// Which loops run and how they pace themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub motion_enabled: bool,
    pub distance_enabled: bool,
    pub card_enabled: bool,

    /// Delay between distance readings.
    pub distance_poll_interval: Duration,
    /// Delay after every card read attempt, successful or not.
    pub card_retry_delay: Duration,
    /// Back-off after a motion sensor error.
    pub sensor_retry_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            motion_enabled: true,
            distance_enabled: true,
            card_enabled: true,
            distance_poll_interval: Duration::from_millis(DEFAULT_DISTANCE_POLL_MS),
            card_retry_delay: Duration::from_millis(DEFAULT_CARD_RETRY_MS),
            sensor_retry_delay: Duration::from_millis(DEFAULT_SENSOR_RETRY_MS),
        }
    }
}

/// Which devices are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStats {
    pub motion_registered: bool,
    pub distance_registered: bool,
    pub card_registered: bool,
}

/// Collects devices, then spawns one loop per enabled device.
pub struct MonitorSupervisor {
    config: MonitorConfig,
    alarm: AlarmController,
    mode: ModeController,
    motion: Option<AnyMotionSensor>,
    distance: Option<AnyDistanceSensor>,
    card: Option<AnyCardReader>,
}

impl MonitorSupervisor {
    pub fn new(config: MonitorConfig, alarm: AlarmController) -> Self {
        Self {
            config,
            mode: ModeController::new(alarm.clone()),
            alarm,
            motion: None,
            distance: None,
            card: None,
        }
    }

    pub fn register_motion(&mut self, sensor: AnyMotionSensor) {
        self.motion = Some(sensor);
    }

    pub fn register_distance(&mut self, sensor: AnyDistanceSensor) {
        self.distance = Some(sensor);
    }

    pub fn register_card(&mut self, reader: AnyCardReader) {
        self.card = Some(reader);
    }

    pub fn is_enabled(&self, monitor: Monitor) -> bool {
        match monitor {
            Monitor::Motion => self.config.motion_enabled,
            Monitor::Distance => self.config.distance_enabled,
            Monitor::Card => self.config.card_enabled,
        }
    }

    pub fn get_stats(&self) -> MonitorStats {
        MonitorStats {
            motion_registered: self.motion.is_some(),
            distance_registered: self.distance.is_some(),
            card_registered: self.card.is_some(),
        }
    }

    /// Spawn a task for every registered and enabled device.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(mut self) -> MonitorHandle {
        let token = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let stats = self.get_stats();

        for (monitor, registered) in [
            (Monitor::Motion, stats.motion_registered),
            (Monitor::Distance, stats.distance_registered),
            (Monitor::Card, stats.card_registered),
        ] {
            match (self.is_enabled(monitor), registered) {
                (true, false) => warn!(%monitor, "Monitor enabled but no device registered"),
                (false, true) => info!(%monitor, "Monitor disabled by configuration"),
                _ => {}
            }
        }

        if self.is_enabled(Monitor::Motion)
            && let Some(sensor) = self.motion.take()
        {
            tasks.spawn(motion_loop(
                sensor,
                self.alarm.clone(),
                self.config.sensor_retry_delay,
                token.clone(),
            ));
        }

        if self.is_enabled(Monitor::Distance)
            && let Some(sensor) = self.distance.take()
        {
            tasks.spawn(distance_loop(
                sensor,
                self.alarm.clone(),
                self.config.distance_poll_interval,
                token.clone(),
            ));
        }

        if self.is_enabled(Monitor::Card)
            && let Some(reader) = self.card.take()
        {
            tasks.spawn(card_loop(
                reader,
                self.mode.clone(),
                self.config.card_retry_delay,
                token.clone(),
            ));
        }

        info!(monitors = tasks.len(), "Monitors started");
        MonitorHandle { token, tasks }
    }
}

/// Running monitor tasks.
pub struct MonitorHandle {
    token: CancellationToken,
    tasks: JoinSet<Monitor>,
}

impl MonitorHandle {
    /// Token the loops watch. Cancelling it stops them.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every loop.
    ///
    /// Cancels the shared token and waits up to `grace` for the loops to
    /// return. Anything still running after that is aborted.
    pub async fn shutdown(mut self, grace: Duration) -> ShutdownReport {
        self.token.cancel();
        let deadline = tokio::time::Instant::now() + grace;
        let mut report = ShutdownReport::default();

        loop {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(result)) => report.record(result),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        remaining = self.tasks.len(),
                        grace_ms = grace.as_millis() as u64,
                        "Monitors did not stop in time, aborting"
                    );
                    self.tasks.abort_all();
                    while let Some(result) = self.tasks.join_next().await {
                        report.record(result);
                    }
                    break;
                }
            }
        }

        info!(
            completed = report.completed,
            panicked = report.panicked,
            aborted = report.aborted,
            "Monitors shut down"
        );
        report
    }
}

/// How the monitor tasks ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Loops that saw the cancellation and returned.
    pub completed: usize,
    pub panicked: usize,
    /// Loops aborted after the grace period.
    pub aborted: usize,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.panicked == 0 && self.aborted == 0
    }

    fn record(&mut self, result: Result<Monitor, JoinError>) {
        match result {
            Ok(monitor) => {
                debug!(%monitor, "Monitor stopped");
                self.completed += 1;
            }
            Err(e) if e.is_cancelled() => self.aborted += 1,
            Err(e) => {
                warn!(error = %e, "Monitor task panicked");
                self.panicked += 1;
            }
        }
    }
}

// ==============================================================================
// Loops
// ==============================================================================

/// Run `fut` unless the token fires first.
async fn or_cancelled<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        _ = token.cancelled() => None,
        output = fut => Some(output),
    }
}

/// Sleep for `delay`. Returns `false` if cancelled meanwhile.
async fn pause(token: &CancellationToken, delay: Duration) -> bool {
    or_cancelled(token, tokio::time::sleep(delay)).await.is_some()
}

async fn motion_loop(
    mut sensor: AnyMotionSensor,
    alarm: AlarmController,
    retry_delay: Duration,
    token: CancellationToken,
) -> Monitor {
    if let Ok(info) = sensor.get_info().await {
        info!(device = %info.name, model = %info.model, "Motion monitor running");
    }

    loop {
        let Some(presence) = or_cancelled(&token, sensor.wait_for_presence()).await else {
            break;
        };
        if let Err(e) = presence {
            warn!(error = %e, "Motion sensor error");
            if !pause(&token, retry_delay).await {
                break;
            }
            continue;
        }

        let now = Utc::now();
        let armed = alarm.state().update(|s| {
            s.record_motion(true, now);
            s.armed
        });
        debug!(armed, "Motion detected");
        if armed {
            alarm.trigger(REASON_MOTION);
        }

        // Stay on this edge until the sensor settles, even across errors.
        loop {
            match or_cancelled(&token, sensor.wait_for_absence()).await {
                None => return Monitor::Motion,
                Some(Ok(())) => break,
                Some(Err(e)) => {
                    warn!(error = %e, "Motion sensor error");
                    if !pause(&token, retry_delay).await {
                        return Monitor::Motion;
                    }
                }
            }
        }
        alarm
            .state()
            .update(|s| s.record_motion(false, Utc::now()));
        debug!("Motion cleared");
    }

    Monitor::Motion
}

async fn distance_loop(
    mut sensor: AnyDistanceSensor,
    alarm: AlarmController,
    poll_interval: Duration,
    token: CancellationToken,
) -> Monitor {
    if let Ok(info) = sensor.get_info().await {
        info!(device = %info.name, model = %info.model, "Distance monitor running");
    }

    let mut failing = false;

    loop {
        let Some(reading) = or_cancelled(&token, sensor.read_distance()).await else {
            break;
        };

        match reading {
            Ok(meters) => {
                if failing {
                    info!("Distance sensor recovered");
                    failing = false;
                }

                let cm = meters_to_cm(meters);
                let now = Utc::now();
                let reason = alarm.state().update(|s| {
                    s.record_distance(cm, now);
                    s.distance_triggers(cm).then(|| s.distance_reason())
                });
                if let Some(reason) = reason {
                    alarm.trigger(&reason);
                }
            }
            Err(e) if failing => debug!(error = %e, "Distance sensor still failing"),
            Err(e) => {
                warn!(error = %e, "Distance sensor error");
                failing = true;
            }
        }

        if !pause(&token, poll_interval).await {
            break;
        }
    }

    Monitor::Distance
}

async fn card_loop(
    mut reader: AnyCardReader,
    mode: ModeController,
    retry_delay: Duration,
    token: CancellationToken,
) -> Monitor {
    if let Ok(info) = reader.get_info().await {
        info!(device = %info.name, model = %info.model, "Card monitor running");
    }

    loop {
        let Some(read) = or_cancelled(&token, reader.read_tag()).await else {
            break;
        };

        match read {
            Ok(card) => {
                debug!(tag = %card.tag, "Card read");
                mode.card_toggle(card.tag);
            }
            Err(e) if e.is_disconnect() => warn!(error = %e, "Card reader disconnected"),
            Err(e) => debug!(error = %e, "Card read failed"),
        }

        if !pause(&token, retry_delay).await {
            break;
        }
    }

    Monitor::Card
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::NullNotifier;
    use crate::store::SharedState;
    use homeguard_hardware::mock::{
        MockCardReader, MockDistanceSensor, MockIndicator, MockMotionSensor,
    };
    use rstest::rstest;
    use std::sync::Arc;

    fn alarm() -> AlarmController {
        AlarmController::new(
            SharedState::default(),
            Arc::new(MockIndicator::new()),
            Arc::new(NullNotifier),
        )
    }

    #[rstest]
    #[case(0.3, 30.0)]
    #[case(0.2999, 30.0)]
    #[case(0.30049, 30.0)]
    #[case(0.30051, 30.1)]
    #[case(0.0, 0.0)]
    #[case(4.0, 400.0)]
    fn test_meters_to_cm(#[case] meters: f64, #[case] cm: f64) {
        assert_eq!(meters_to_cm(meters), cm);
    }

    #[test]
    fn test_stats_track_registration() {
        let mut supervisor = MonitorSupervisor::new(MonitorConfig::default(), alarm());
        assert_eq!(
            supervisor.get_stats(),
            MonitorStats {
                motion_registered: false,
                distance_registered: false,
                card_registered: false,
            }
        );

        let (reader, _handle) = MockCardReader::new();
        supervisor.register_card(AnyCardReader::Mock(reader));
        assert!(supervisor.get_stats().card_registered);
        assert!(supervisor.is_enabled(Monitor::Card));
    }

    #[tokio::test]
    async fn test_start_ignores_enabled_monitor_without_device() {
        let mut supervisor = MonitorSupervisor::new(MonitorConfig::default(), alarm());
        let (reader, _card) = MockCardReader::new();
        supervisor.register_card(AnyCardReader::Mock(reader));

        assert!(supervisor.is_enabled(Monitor::Motion));
        assert!(!supervisor.get_stats().motion_registered);

        let handle = supervisor.start();
        assert_eq!(handle.running(), 1);
        assert!(handle.shutdown(Duration::from_secs(1)).await.is_clean());
    }

    #[tokio::test]
    async fn test_start_skips_disabled_monitors() {
        let config = MonitorConfig {
            distance_enabled: false,
            ..MonitorConfig::default()
        };
        let mut supervisor = MonitorSupervisor::new(config, alarm());

        let (pir, _pir) = MockMotionSensor::new();
        let (ranger, _ranger) = MockDistanceSensor::new(2.0);
        supervisor.register_motion(AnyMotionSensor::Mock(pir));
        supervisor.register_distance(AnyDistanceSensor::Mock(ranger));

        let handle = supervisor.start();
        assert_eq!(handle.running(), 1);

        let report = handle.shutdown(Duration::from_secs(1)).await;
        assert_eq!(report.completed, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_shutdown_with_no_monitors() {
        let handle = MonitorSupervisor::new(MonitorConfig::default(), alarm()).start();
        assert_eq!(handle.running(), 0);
        assert_eq!(
            handle.shutdown(Duration::from_millis(10)).await,
            ShutdownReport::default()
        );
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_blocked_waits() {
        let mut supervisor = MonitorSupervisor::new(MonitorConfig::default(), alarm());

        // Nothing will ever be presented to either device.
        let (pir, _pir) = MockMotionSensor::new();
        let (reader, _reader) = MockCardReader::new();
        supervisor.register_motion(AnyMotionSensor::Mock(pir));
        supervisor.register_card(AnyCardReader::Mock(reader));

        let handle = supervisor.start();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let report = handle.shutdown(Duration::from_secs(1)).await;
        assert_eq!(report.completed, 2);
        assert_eq!(report.aborted, 0);
    }

    #[test]
    fn test_report_classification() {
        let mut report = ShutdownReport::default();
        report.record(Ok(Monitor::Motion));
        report.record(Ok(Monitor::Card));
        assert_eq!(report.completed, 2);
        assert!(report.is_clean());
    }
}
