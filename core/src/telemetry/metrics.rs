use std::sync::Mutex;

/// Counts computation outcomes for one engine.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub computed: usize,
    pub skipped: usize,
    pub failed: usize,
}

struct Metrics {
    computed: usize,
    skipped: usize,
    failed: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics {
                computed: 0,
                skipped: 0,
                failed: 0,
            }),
        }
    }

    pub fn record_computed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.computed += 1;
        }
    }

    pub fn record_skipped(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.skipped += 1;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.failed += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                computed: metrics.computed,
                skipped: metrics.skipped,
                failed: metrics.failed,
            }
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
