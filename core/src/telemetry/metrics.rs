use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Counts recoverable events that never abort a session.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub spawn_failures: usize,
    pub spawn_blocked: usize,
    pub unmatched_detections: usize,
    pub skipped_detections: usize,
    pub sink_errors: usize,
    pub actor_errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_spawn_failure(&self) {
        self.update(|m| m.spawn_failures += 1);
    }

    pub fn record_spawn_blocked(&self) {
        self.update(|m| m.spawn_blocked += 1);
    }

    pub fn record_unmatched(&self) {
        self.update(|m| m.unmatched_detections += 1);
    }

    pub fn record_skipped(&self) {
        self.update(|m| m.skipped_detections += 1);
    }

    pub fn record_sink_error(&self) {
        self.update(|m| m.sink_errors += 1);
    }

    pub fn record_actor_error(&self) {
        self.update(|m| m.actor_errors += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
