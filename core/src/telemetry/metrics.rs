use std::sync::Mutex;

/// Counts processed and failed runs across a batch.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

struct Metrics {
    processed: usize,
    good: usize,
    errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics {
                processed: 0,
                good: 0,
                errors: 0,
            }),
        }
    }

    pub fn record_processed(&self, is_good: bool) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.processed += 1;
            if is_good {
                metrics.good += 1;
            }
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    /// `(processed, good, errors)`
    pub fn snapshot(&self) -> (usize, usize, usize) {
        if let Ok(metrics) = self.inner.lock() {
            (metrics.processed, metrics.good, metrics.errors)
        } else {
            (0, 0, 0)
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
