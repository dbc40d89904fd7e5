use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use stride_core::{JobId, JobKind};

/// Receives `(JobId, nanos)` observations at dispatch and completion, and a
/// single end-of-run marker. Purely observational: no correctness hangs off
/// a sink, and sinks must tolerate being called from the scheduler's
/// critical section.
pub trait StatisticsSink: Send + Sync {
    fn dispatched(&self, id: JobId, nanos: i64);
    fn completed(&self, id: JobId, nanos: i64);
    /// End of run.
    fn finished(&self);
}

/// Wall-clock nanoseconds for sink observations.
pub fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(-1)
}

/// Discards everything.
pub struct NullSink;

impl StatisticsSink for NullSink {
    fn dispatched(&self, _id: JobId, _nanos: i64) {}
    fn completed(&self, _id: JobId, _nanos: i64) {}
    fn finished(&self) {}
}

/// Records a human-readable dispatch/completion trace: `>id` on dispatch,
/// `<id` on completion, `.` at end of run.
///
/// The trace is a diagnostic artifact only: two drivers over the same graph
/// may produce different traces while agreeing on final state.
#[derive(Default)]
pub struct TraceSink {
    lines: Mutex<Vec<String>>,
}

impl TraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }

    /// The trace so far, space-joined.
    pub fn trace(&self) -> String {
        self.lines
            .lock()
            .map(|lines| lines.join(" "))
            .unwrap_or_default()
    }
}

impl StatisticsSink for TraceSink {
    fn dispatched(&self, id: JobId, _nanos: i64) {
        self.push(format!(">{id}"));
    }

    fn completed(&self, id: JobId, _nanos: i64) {
        self.push(format!("<{id}"));
    }

    fn finished(&self) {
        self.push(".".to_string());
    }
}

/// Per-kind operational counters for a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    /// Jobs dispatched, by kind.
    pub dispatched: HashMap<u8, u64>,
    /// Jobs completed, by kind.
    pub completed: HashMap<u8, u64>,
    /// Rolling average dispatch-to-completion span, by kind.
    pub avg_span: HashMap<u8, Duration>,
    /// Whether the end-of-run marker arrived.
    pub finished: bool,
}

impl StatsSnapshot {
    fn record_span(&mut self, kind: JobKind, span: Duration) {
        let count = self.completed[&kind.0];
        let prev = self.avg_span.get(&kind.0).copied().unwrap_or_default();
        // Incremental mean: new = prev + (span - prev) / count
        let new = if count == 1 {
            span
        } else {
            let prev_nanos = prev.as_nanos() as f64;
            let span_nanos = span.as_nanos() as f64;
            Duration::from_nanos((prev_nanos + (span_nanos - prev_nanos) / count as f64) as u64)
        };
        self.avg_span.insert(kind.0, new);
    }
}

/// Aggregating sink: counts dispatches and completions per kind and keeps a
/// rolling mean of each kind's dispatch-to-completion span.
#[derive(Default)]
pub struct RunStatistics {
    inner: Mutex<RunStatsInner>,
}

#[derive(Default)]
struct RunStatsInner {
    snapshot: StatsSnapshot,
    /// Dispatch timestamps of in-flight jobs.
    open: HashMap<JobId, i64>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner
            .lock()
            .map(|inner| inner.snapshot.clone())
            .unwrap_or_default()
    }
}

impl StatisticsSink for RunStatistics {
    fn dispatched(&self, id: JobId, nanos: i64) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner.snapshot.dispatched.entry(id.kind().0).or_default() += 1;
            inner.open.insert(id, nanos);
        }
    }

    fn completed(&self, id: JobId, nanos: i64) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner.snapshot.completed.entry(id.kind().0).or_default() += 1;
            if let Some(start) = inner.open.remove(&id) {
                let span = Duration::from_nanos(nanos.saturating_sub(start).max(0) as u64);
                inner.snapshot.record_span(id.kind(), span);
            }
        }
    }

    fn finished(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.snapshot.finished = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(step: u64, kind: u8) -> JobId {
        JobId::new(step, JobKind(kind))
    }

    #[test]
    fn trace_records_dispatch_and_completion_order() {
        let sink = TraceSink::new();
        sink.dispatched(id(0, 0), 1);
        sink.dispatched(id(1, 0), 2);
        sink.completed(id(0, 0), 3);
        sink.finished();
        assert_eq!(sink.trace(), ">0:0 >1:0 <0:0 .");
    }

    #[test]
    fn run_statistics_counts_per_kind() {
        let stats = RunStatistics::new();
        stats.dispatched(id(0, 0), 100);
        stats.completed(id(0, 0), 350);
        stats.dispatched(id(0, 1), 400);
        stats.completed(id(0, 1), 500);
        stats.dispatched(id(1, 0), 600);
        stats.completed(id(1, 0), 650);
        stats.finished();

        let snap = stats.snapshot();
        assert_eq!(snap.dispatched[&0], 2);
        assert_eq!(snap.completed[&0], 2);
        assert_eq!(snap.completed[&1], 1);
        assert!(snap.finished);
        // Spans 250ns and 50ns average to 150ns for kind 0.
        assert_eq!(snap.avg_span[&0], Duration::from_nanos(150));
    }

    #[test]
    fn now_nanos_is_monotonic_enough() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(b >= a);
    }
}
