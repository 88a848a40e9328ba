//! Mock indicator output.

use crate::{Result, traits::Indicator};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Indicator that remembers its level and how often it was switched.
///
/// Clones share state, so a test can keep one clone while the alarm
/// controller drives another.
#[derive(Debug, Clone, Default)]
pub struct MockIndicator {
    inner: Arc<IndicatorInner>,
}

#[derive(Debug, Default)]
struct IndicatorInner {
    lit: AtomicBool,
    switched_on: AtomicUsize,
    switched_off: AtomicUsize,
}

impl MockIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `on()` calls so far.
    pub fn on_count(&self) -> usize {
        self.inner.switched_on.load(Ordering::SeqCst)
    }

    /// Number of `off()` calls so far.
    pub fn off_count(&self) -> usize {
        self.inner.switched_off.load(Ordering::SeqCst)
    }
}

impl Indicator for MockIndicator {
    fn on(&self) -> Result<()> {
        self.inner.lit.store(true, Ordering::SeqCst);
        self.inner.switched_on.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("[MOCK LED] on");
        Ok(())
    }

    fn off(&self) -> Result<()> {
        self.inner.lit.store(false, Ordering::SeqCst);
        self.inner.switched_off.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("[MOCK LED] off");
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.inner.lit.load(Ordering::SeqCst)
    }
}
