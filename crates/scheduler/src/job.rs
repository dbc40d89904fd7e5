use std::sync::Arc;

use stride_core::{JobError, JobId};

/// One single-use unit of work: a [`JobId`] bound to an externally supplied
/// computation.
///
/// The closure owns everything it needs (inputs are handed over at
/// construction); it touches no scheduler state, so `run` can execute on any
/// worker thread outside the scheduler's critical section.
pub struct Job<R> {
    id: JobId,
    work: Box<dyn FnOnce() -> Result<R, JobError> + Send>,
}

impl<R> Job<R> {
    pub fn new(id: JobId, work: impl FnOnce() -> Result<R, JobError> + Send + 'static) -> Self {
        Self {
            id,
            work: Box::new(work),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Consume the job and produce its result.
    pub fn run(self) -> Result<R, JobError> {
        (self.work)()
    }
}

impl<R> std::fmt::Debug for Job<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish()
    }
}

/// Builds the domain computation for a ready id.
///
/// `inputs` aligns index-for-index with the graph's predecessor list for
/// `id`; boundary sentinels arrive as `None`. Called only inside the
/// scheduler's critical section, so implementations may keep mutable state
/// (accumulators, open outputs) without their own locking.
pub trait JobFactory<R>: Send {
    fn create(&mut self, id: JobId, inputs: Vec<Option<Arc<R>>>) -> Job<R>;
}

impl<R, F> JobFactory<R> for F
where
    F: FnMut(JobId, Vec<Option<Arc<R>>>) -> Job<R> + Send,
{
    fn create(&mut self, id: JobId, inputs: Vec<Option<Arc<R>>>) -> Job<R> {
        self(id, inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::JobKind;

    #[test]
    fn job_runs_once_and_reports_id() {
        let id = JobId::new(4, JobKind(1));
        let job = Job::new(id, || Ok::<_, JobError>(21 * 2));
        assert_eq!(job.id(), id);
        assert_eq!(job.run().unwrap(), 42);
    }

    #[test]
    fn job_failure_carries_message() {
        let job: Job<()> = Job::new(JobId::new(0, JobKind(0)), || {
            Err(JobError::new("input chunk truncated"))
        });
        assert_eq!(job.run().unwrap_err().to_string(), "input chunk truncated");
    }

    #[test]
    fn closures_are_factories() {
        let mut factory = |id: JobId, inputs: Vec<Option<Arc<u32>>>| {
            let sum: u32 = inputs.iter().flatten().map(|r| **r).sum();
            Job::new(id, move || Ok(sum))
        };
        let job = factory.create(
            JobId::new(1, JobKind(0)),
            vec![None, Some(Arc::new(5)), Some(Arc::new(7))],
        );
        assert_eq!(job.run().unwrap(), 12);
    }
}
