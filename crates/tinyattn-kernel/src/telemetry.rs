//! Lock-free call counters for an operator.

use crate::domain::DomainReport;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by every forward and backward call.
#[derive(Debug, Default)]
pub struct OperatorTelemetry {
    forward_calls: AtomicU64,
    backward_calls: AtomicU64,
    elements_seen: AtomicU64,
    out_of_range: AtomicU64,
    rewritten: AtomicU64,
    stale_contexts: AtomicU64,
}

/// Point-in-time copy of [`OperatorTelemetry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub forward_calls: u64,
    pub backward_calls: u64,
    /// Raw feature elements processed by forward
    pub elements_seen: u64,
    /// Raw inputs with `|x| > 1`
    pub out_of_range: u64,
    /// Out-of-range inputs the domain policy rewrote before expansion
    pub rewritten: u64,
    /// Pending forward contexts replaced before their backward ran
    pub stale_contexts: u64,
}

impl TelemetrySnapshot {
    /// Fraction of processed elements outside `[-1, 1]`.
    pub fn out_of_range_ratio(&self) -> f64 {
        if self.elements_seen == 0 {
            0.0
        } else {
            self.out_of_range as f64 / self.elements_seen as f64
        }
    }
}

impl OperatorTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed forward call.
    pub fn record_forward(&self, report: &DomainReport, rewritten: bool) {
        self.forward_calls.fetch_add(1, Ordering::Relaxed);
        self.elements_seen
            .fetch_add(report.total as u64, Ordering::Relaxed);
        self.out_of_range
            .fetch_add(report.out_of_range as u64, Ordering::Relaxed);
        if rewritten {
            self.rewritten
                .fetch_add(report.out_of_range as u64, Ordering::Relaxed);
        }
    }

    /// Record a completed backward call.
    pub fn record_backward(&self) {
        self.backward_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a pending context was dropped without a backward.
    pub fn record_stale_context(&self) {
        self.stale_contexts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            forward_calls: self.forward_calls.load(Ordering::Relaxed),
            backward_calls: self.backward_calls.load(Ordering::Relaxed),
            elements_seen: self.elements_seen.load(Ordering::Relaxed),
            out_of_range: self.out_of_range.load(Ordering::Relaxed),
            rewritten: self.rewritten.load(Ordering::Relaxed),
            stale_contexts: self.stale_contexts.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.forward_calls,
            &self.backward_calls,
            &self.elements_seen,
            &self.out_of_range,
            &self.rewritten,
            &self.stale_contexts,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let telemetry = OperatorTelemetry::new();
        let report = DomainReport {
            total: 10,
            out_of_range: 3,
        };
        telemetry.record_forward(&report, true);
        telemetry.record_forward(&report, false);
        telemetry.record_backward();
        telemetry.record_stale_context();

        let snap = telemetry.snapshot();
        assert_eq!(snap.forward_calls, 2);
        assert_eq!(snap.backward_calls, 1);
        assert_eq!(snap.elements_seen, 20);
        assert_eq!(snap.out_of_range, 6);
        assert_eq!(snap.rewritten, 3);
        assert_eq!(snap.stale_contexts, 1);
        assert!((snap.out_of_range_ratio() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_reset() {
        let telemetry = OperatorTelemetry::new();
        telemetry.record_backward();
        telemetry.reset();
        assert_eq!(telemetry.snapshot(), TelemetrySnapshot::default());
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = TelemetrySnapshot {
            forward_calls: 4,
            ..Default::default()
        };
        let json = serde_json::to_string(&snap).unwrap();
        let back: TelemetrySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
