//! Plugin execution counters.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::trace;

use super::registry::PhaseObserver;
use crate::domain::Phase;

/// Counts plugin executions per phase
#[derive(Debug, Default)]
pub struct PhaseMetrics {
    counts: Mutex<BTreeMap<Phase, u64>>,
}

impl PhaseMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executions recorded for a phase
    pub fn count(&self, phase: &Phase) -> u64 {
        self.lock().get(phase).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.lock().values().sum()
    }

    pub fn snapshot(&self) -> BTreeMap<Phase, u64> {
        self.lock().clone()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<Phase, u64>> {
        // counters stay usable after a panicking holder
        self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PhaseObserver for PhaseMetrics {
    fn on_plugin_run(&self, phase: &Phase) {
        let mut counts = self.lock();
        let count = counts.entry(phase.clone()).or_insert(0);
        *count += 1;
        trace!(%phase, count = *count, "Plugin execution recorded");
    }
}
