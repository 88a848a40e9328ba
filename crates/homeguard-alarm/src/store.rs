//! Shared state store.
//!
//! One [`SystemState`] per process, behind a plain mutex. Every read and
//! write takes the whole record, so a reader can never observe a half-applied
//! update (for example `alarm_active` set but `alarm_reason` still empty).

use homeguard_core::SystemState;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle to the process-wide [`SystemState`].
///
/// # Examples
///
/// ```
/// use homeguard_alarm::SharedState;
///
/// let state = SharedState::with_threshold(30.0);
/// let loop_view = state.clone();
///
/// loop_view.update(|s| s.record_distance(42.0, chrono::Utc::now()));
/// assert_eq!(state.snapshot().distance_cm, Some(42.0));
/// ```
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<SystemState>>,
}

impl SharedState {
    pub fn new(state: SystemState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Fresh armed state with the given distance threshold.
    pub fn with_threshold(distance_threshold_cm: f64) -> Self {
        Self::new(SystemState::new(distance_threshold_cm))
    }

    /// Copy of the whole record, taken atomically.
    pub fn snapshot(&self) -> SystemState {
        self.lock().clone()
    }

    /// Apply `f` to the record while holding the lock.
    ///
    /// Keep `f` short: no I/O beyond switching the indicator, and never
    /// await inside it.
    pub fn update<R>(&self, f: impl FnOnce(&mut SystemState) -> R) -> R {
        let mut guard = self.lock();
        let result = f(&mut guard);
        debug_assert!(
            guard.check_invariants().is_ok(),
            "state invariant broken: {:?}",
            guard.check_invariants()
        );
        result
    }

    pub fn is_armed(&self) -> bool {
        self.lock().armed
    }

    pub fn alarm_active(&self) -> bool {
        self.lock().alarm_active
    }

    // A panic inside `update` poisons the mutex; the record itself is still
    // whole, so keep serving it.
    fn lock(&self) -> MutexGuard<'_, SystemState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(SystemState::default())
    }
}
