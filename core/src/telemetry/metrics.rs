use crate::StageKind;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Counts engine invocations per stage for a single pipeline run.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub filter_invocations: usize,
    pub notch_invocations: usize,
    pub resample_invocations: usize,
    pub samples_processed: usize,
    pub errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_invocation(&self, stage: StageKind, samples: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            match stage {
                StageKind::Filter => metrics.filter_invocations += 1,
                StageKind::Notch => metrics.notch_invocations += 1,
                StageKind::Resample => metrics.resample_invocations += 1,
            }
            metrics.samples_processed += samples;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocations_are_counted_per_stage() {
        let metrics = MetricsRecorder::new();
        metrics.record_invocation(StageKind::Filter, 100);
        metrics.record_invocation(StageKind::Filter, 50);
        metrics.record_invocation(StageKind::Resample, 10);
        metrics.record_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.filter_invocations, 2);
        assert_eq!(snapshot.notch_invocations, 0);
        assert_eq!(snapshot.resample_invocations, 1);
        assert_eq!(snapshot.samples_processed, 160);
        assert_eq!(snapshot.errors, 1);
    }
}
