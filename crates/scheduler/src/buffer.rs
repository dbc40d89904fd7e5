use std::collections::BTreeMap;
use std::sync::Arc;

use stride_core::{JobId, Result, StrideError};

use crate::window::LookAheadWindow;

struct Event<R> {
    result: Arc<R>,
    /// Successors that have not read this result yet.
    pending_reads: usize,
}

/// Holds each completed job's result until every dependent has consumed it,
/// so producers and consumers need not run on the same thread or in
/// lock-step.
///
/// Eviction is reference-counted: a result is inserted with the number of
/// real successors that will read it and dropped when the last one has.
pub struct EventBuffer<R> {
    events: BTreeMap<JobId, Event<R>>,
}

impl<R> EventBuffer<R> {
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
        }
    }

    /// Buffer `result` for `readers` future consumers. A terminal job
    /// (`readers == 0`) stores nothing. Double-buffering the same id means a
    /// job completed twice: a driver bug.
    pub fn insert(&mut self, id: JobId, result: R, readers: usize) -> Result<()> {
        if self.events.contains_key(&id) {
            return Err(StrideError::GraphIntegrity(format!(
                "result for {id} buffered twice"
            )));
        }
        if readers == 0 {
            return Ok(());
        }
        self.events.insert(
            id,
            Event {
                result: Arc::new(result),
                pending_reads: readers,
            },
        );
        Ok(())
    }

    /// Read `id`'s result on behalf of one successor, evicting the entry
    /// once its last pending reader is served. `None` if nothing is buffered
    /// for `id`.
    pub fn read(&mut self, id: JobId) -> Option<Arc<R>> {
        let event = self.events.get_mut(&id)?;
        let result = Arc::clone(&event.result);
        event.pending_reads -= 1;
        if event.pending_reads == 0 {
            self.events.remove(&id);
        }
        Some(result)
    }

    /// Earliest buffered event admissible under `window`, or `None`.
    ///
    /// After a clean run this must return `None` for any window state: a
    /// leftover event is a dangling dependency.
    pub fn next(&self, window: &LookAheadWindow) -> Option<JobId> {
        self.events
            .keys()
            .find(|id| window.admits(id.step(), 0))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<R> Default for EventBuffer<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::JobKind;

    fn id(step: u64) -> JobId {
        JobId::new(step, JobKind(0))
    }

    #[test]
    fn read_hands_out_result_and_evicts_after_last_reader() {
        let mut buf = EventBuffer::new();
        buf.insert(id(1), "records", 2).unwrap();

        assert_eq!(*buf.read(id(1)).unwrap(), "records");
        assert_eq!(buf.len(), 1, "one reader still pending");
        assert_eq!(*buf.read(id(1)).unwrap(), "records");
        assert!(buf.is_empty(), "evicted after final reader");
        assert!(buf.read(id(1)).is_none());
    }

    #[test]
    fn terminal_results_are_not_retained() {
        let mut buf = EventBuffer::new();
        buf.insert(id(9), "tail", 0).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn double_insert_rejected() {
        let mut buf = EventBuffer::new();
        buf.insert(id(3), "a", 1).unwrap();
        assert!(buf.insert(id(3), "b", 1).is_err());
    }

    #[test]
    fn next_respects_window() {
        let mut buf = EventBuffer::new();
        buf.insert(id(2), "x", 1).unwrap();
        buf.insert(id(8), "y", 1).unwrap();

        let mut window = LookAheadWindow::new(1, 0);
        window.increment(2).unwrap();
        assert_eq!(buf.next(&window), Some(id(2)));

        buf.read(id(2));
        assert_eq!(buf.next(&window), None, "id 8 is outside [2, 3]");

        let empty = LookAheadWindow::new(1, 0);
        assert_eq!(buf.next(&empty), Some(id(8)), "empty window sees everything");
    }
}
