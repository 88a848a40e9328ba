//! Outbound alert events and the dispatch seam.
//!
//! Controllers hand every [`AlertEvent`] to a [`Notifier`] after the state
//! lock has been released. Delivery is best effort: `dispatch` never blocks
//! the caller and never reports failure back to it.

use homeguard_core::{TagId, Timestamp};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// Mode-change direction carried by [`AlertEvent::ModeChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeAction {
    Arm,
    Disarm,
}

impl ModeAction {
    pub fn from_armed(armed: bool) -> Self {
        if armed { Self::Arm } else { Self::Disarm }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Disarm => "disarm",
        }
    }
}

impl std::fmt::Display for ModeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker serialized as `"type": "rfid"` on card events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Rfid,
}

/// One JSON body POSTed to the alert service.
///
/// Serialized untagged, so each variant becomes a flat object:
///
/// ```text
/// {"time": "...", "sensor": "motion", "description": "Motion detected"}
/// {"action": "arm", "time": "..."}
/// {"type": "rfid", "time": "...", "tag": 584190412}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AlertEvent {
    Alarm {
        time: Timestamp,
        sensor: String,
        description: String,
    },
    ModeChange {
        action: ModeAction,
        time: Timestamp,
    },
    Rfid {
        #[serde(rename = "type")]
        kind: EventKind,
        time: Timestamp,
        tag: TagId,
    },
}

impl AlertEvent {
    pub fn alarm(
        sensor: impl Into<String>,
        description: impl Into<String>,
        time: Timestamp,
    ) -> Self {
        Self::Alarm {
            time,
            sensor: sensor.into(),
            description: description.into(),
        }
    }

    pub fn mode_change(action: ModeAction, time: Timestamp) -> Self {
        Self::ModeChange { action, time }
    }

    pub fn rfid(tag: TagId, time: Timestamp) -> Self {
        Self::Rfid {
            kind: EventKind::Rfid,
            time,
            tag,
        }
    }

    /// Short label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Alarm { .. } => "alarm",
            Self::ModeChange { .. } => "mode",
            Self::Rfid { .. } => "rfid",
        }
    }

    pub fn time(&self) -> Timestamp {
        match self {
            Self::Alarm { time, .. }
            | Self::ModeChange { time, .. }
            | Self::Rfid { time, .. } => *time,
        }
    }
}

/// Best-effort alert sink.
///
/// Implementations must return promptly; anything slow (network I/O) belongs
/// in a spawned task.
pub trait Notifier: Send + Sync {
    fn dispatch(&self, event: AlertEvent);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn dispatch(&self, event: AlertEvent) {
        (**self).dispatch(event)
    }
}

/// Drops every event. Used when no alert URL is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn dispatch(&self, event: AlertEvent) {
        tracing::trace!(event = event.label(), "Alert discarded");
    }
}

/// Keeps every dispatched event in memory, in order.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<AlertEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AlertEvent> {
        self.lock().clone()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<AlertEvent> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AlertEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Notifier for RecordingNotifier {
    fn dispatch(&self, event: AlertEvent) {
        tracing::debug!(event = event.label(), "Alert recorded");
        self.lock().push(event);
    }
}
