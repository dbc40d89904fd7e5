use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use stride_core::{JobId, Result, StrideError};

use crate::buffer::EventBuffer;
use crate::graph::DependencyGraph;
use crate::job::{Job, JobFactory};
use crate::stats::{now_nanos, NullSink, StatisticsSink};
use crate::types::{Completion, Phase};
use crate::window::LookAheadWindow;

/// The synchronized coordinator: given a completed job, updates graph,
/// window and buffer state and hands out the next job to run.
///
/// All bookkeeping lives behind one mutex, so `done_next` is safe to call
/// concurrently from any number of worker threads; only job construction
/// happens inside the critical section, never job execution.
pub struct Scheduler<R> {
    inner: Mutex<Inner<R>>,
    stats: Arc<dyn StatisticsSink>,
}

struct Inner<R> {
    graph: Box<dyn DependencyGraph>,
    factory: Box<dyn JobFactory<R>>,
    window: LookAheadWindow,
    buffer: EventBuffer<R>,
    phase: Phase,
}

impl<R> Scheduler<R> {
    /// The window's extra slack comes from the graph
    /// ([`DependencyGraph::delta`]), so graph-approved candidates always
    /// pass window admission.
    pub fn new(
        graph: Box<dyn DependencyGraph>,
        factory: Box<dyn JobFactory<R>>,
        look_ahead: u64,
    ) -> Self {
        Self::with_stats(graph, factory, look_ahead, Arc::new(NullSink))
    }

    pub fn with_stats(
        graph: Box<dyn DependencyGraph>,
        factory: Box<dyn JobFactory<R>>,
        look_ahead: u64,
        stats: Arc<dyn StatisticsSink>,
    ) -> Self {
        let window = LookAheadWindow::new(look_ahead, graph.delta());
        info!(look_ahead, delta = graph.delta(), "scheduler created");
        Self {
            inner: Mutex::new(Inner {
                graph,
                factory,
                window,
                buffer: EventBuffer::new(),
                phase: Phase::Idle,
            }),
            stats,
        }
    }

    /// Feed back a completion (or `None` to just ask for work) and receive
    /// the next job, or `None` when no work is currently available.
    ///
    /// A `None` return with jobs still in flight means their completions
    /// will unlock more work; a `None` once the window has drained means the
    /// run is done.
    pub fn done_next(&self, completion: Option<Completion<R>>) -> Result<Option<Job<R>>> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| StrideError::LockPoisoned(format!("scheduler state: {e}")))?;
        let inner = &mut *guard;

        if let Some(c) = completion {
            debug!(id = %c.id, "< completed");
            self.stats.completed(c.id, c.nanos);
            inner.graph.completed(c.id);
            let readers = inner.graph.successors(c.id).iter().flatten().count();
            inner.buffer.insert(c.id, c.result, readers)?;
            inner.window.decrement(c.id.step())?;
        }

        let candidate = inner.graph.next(&inner.window);
        match candidate {
            Some(id) => {
                inner.graph.verify(id)?;
                inner.window.increment(id.step())?;
                let inputs = gather_inputs(inner.graph.as_ref(), &mut inner.buffer, id)?;
                inner.phase = Phase::Running;
                debug!(id = %id, "> dispatched");
                self.stats.dispatched(id, now_nanos());
                Ok(Some(inner.factory.create(id, inputs)))
            }
            None => {
                if inner.window.is_empty() {
                    if inner.phase != Phase::Done {
                        inner.phase = Phase::Done;
                        info!("run complete");
                        self.stats.finished();
                    }
                } else if inner.phase == Phase::Running {
                    inner.phase = Phase::Draining;
                }
                Ok(None)
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().map(|inner| inner.phase).unwrap_or(Phase::Done)
    }

    pub fn is_done(&self) -> bool {
        self.phase() == Phase::Done
    }

    /// Diagnostic: the earliest buffered event admissible under the current
    /// window. Must be `None` after a clean run.
    pub fn pending_event(&self) -> Option<JobId> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.buffer.next(&inner.window))
    }

    /// End-of-run assertion: window drained and no event left unread. A
    /// violation is a graph-wiring bug (dangling dependency), not user
    /// error.
    pub fn check_empty(&self) -> Result<()> {
        let guard = self
            .inner
            .lock()
            .map_err(|e| StrideError::LockPoisoned(format!("scheduler state: {e}")))?;
        guard.window.check_integrity()?;
        if guard.window.total() != 0 {
            return Err(StrideError::GraphIntegrity(format!(
                "{} jobs still in flight at end of run",
                guard.window.total()
            )));
        }
        if !guard.buffer.is_empty() {
            return Err(StrideError::GraphIntegrity(format!(
                "{} undrained events at end of run (dangling dependency)",
                guard.buffer.len()
            )));
        }
        Ok(())
    }
}

/// Pull the predecessor results a job was promised. The graph said `id` is
/// ready, so a missing result for a real predecessor is a wiring bug.
fn gather_inputs<R>(
    graph: &dyn DependencyGraph,
    buffer: &mut EventBuffer<R>,
    id: JobId,
) -> Result<Vec<Option<std::sync::Arc<R>>>> {
    let mut inputs = Vec::new();
    for pred in graph.predecessors(id) {
        match pred {
            None => inputs.push(None),
            Some(p) => match buffer.read(p) {
                Some(result) => inputs.push(Some(result)),
                None => {
                    return Err(StrideError::GraphIntegrity(format!(
                        "no buffered result for predecessor {p} of {id}"
                    )));
                }
            },
        }
    }
    Ok(inputs)
}
