use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use stride_core::{Result, StrideError};

use crate::job::Job;
use crate::scheduler::Scheduler;
use crate::stats::now_nanos;
use crate::types::Completion;

fn run_job<R>(job: Job<R>) -> Result<Completion<R>> {
    let id = job.id();
    match job.run() {
        Ok(result) => Ok(Completion::new(id, result, now_nanos())),
        Err(source) => Err(StrideError::JobFailed { id, source }),
    }
}

/// Single loop, one job at a time: the deterministic correctness oracle the
/// concurrent drivers are checked against.
pub struct SequentialExecutor<R> {
    scheduler: Arc<Scheduler<R>>,
}

impl<R> SequentialExecutor<R> {
    pub fn new(scheduler: Arc<Scheduler<R>>) -> Self {
        Self { scheduler }
    }

    /// Drain the scheduler to completion, or return the first job failure.
    pub fn run(&self) -> Result<()> {
        let mut next = self.scheduler.done_next(None)?;
        while let Some(job) = next {
            let completion = run_job(job)?;
            next = self.scheduler.done_next(Some(completion))?;
        }
        Ok(())
    }
}

/// Simulates `num_workers` concurrent actors on one thread, advancing a
/// seeded-random pending job at each step.
///
/// Deterministic per seed, but the dispatch/completion trace differs from
/// the sequential driver's whenever more than one job is admitted before
/// the first completion — the cheap existence proof that final state does
/// not depend on execution order.
pub struct RandomizedExecutor<R> {
    scheduler: Arc<Scheduler<R>>,
    num_workers: usize,
    seed: u64,
}

impl<R> RandomizedExecutor<R> {
    pub fn new(scheduler: Arc<Scheduler<R>>, num_workers: usize, seed: u64) -> Self {
        Self {
            scheduler,
            num_workers,
            seed,
        }
    }

    pub fn run(&self) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut pending: Vec<Job<R>> = Vec::new();
        loop {
            // Fill the simulated workers with whatever the window admits.
            while pending.len() < self.num_workers {
                match self.scheduler.done_next(None)? {
                    Some(job) => pending.push(job),
                    None => break,
                }
            }
            if pending.is_empty() {
                break;
            }

            let victim = rng.gen_range(0..pending.len());
            let job = pending.swap_remove(victim);
            debug!(id = %job.id(), "advancing simulated worker");
            let completion = run_job(job)?;
            if let Some(job) = self.scheduler.done_next(Some(completion))? {
                pending.push(job);
            }
        }
        Ok(())
    }
}

/// A real worker-thread pool of `num_workers` driving one shared scheduler.
///
/// Each worker pulls through the scheduler's critical section but executes
/// jobs outside it. The first job failure raises an abort flag: no worker
/// dispatches again, the error is kept, and `run` returns it once every
/// worker has stopped. Results already applied by other workers stay
/// applied; there is no rollback.
pub struct ConcurrentExecutor<R> {
    scheduler: Arc<Scheduler<R>>,
    num_workers: usize,
}

impl<R: Send + Sync> ConcurrentExecutor<R> {
    pub fn new(scheduler: Arc<Scheduler<R>>, num_workers: usize) -> Self {
        Self {
            scheduler,
            num_workers,
        }
    }

    pub fn run(&self) -> Result<()> {
        info!(workers = self.num_workers, "concurrent executor starting");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_workers)
            .build()
            .expect("failed to build worker pool");

        let abort = AtomicBool::new(false);
        let first_error: Mutex<Option<StrideError>> = Mutex::new(None);

        pool.scope(|scope| {
            for worker in 0..self.num_workers {
                let abort = &abort;
                let first_error = &first_error;
                let scheduler = &self.scheduler;
                scope.spawn(move |_| {
                    let mut completion: Option<Completion<R>> = None;
                    loop {
                        if abort.load(Ordering::Relaxed) {
                            // Drop any completion in hand: dispatching off
                            // it would start new work after the failure.
                            break;
                        }
                        let next = match scheduler.done_next(completion.take()) {
                            Ok(next) => next,
                            Err(e) => {
                                store_first(first_error, e);
                                abort.store(true, Ordering::Relaxed);
                                break;
                            }
                        };
                        match next {
                            Some(job) => match run_job(job) {
                                Ok(done) => completion = Some(done),
                                Err(e) => {
                                    warn!(worker, error = %e, "job failed, aborting run");
                                    store_first(first_error, e);
                                    abort.store(true, Ordering::Relaxed);
                                    break;
                                }
                            },
                            None => {
                                if scheduler.is_done() {
                                    break;
                                }
                                // In-flight work elsewhere will unlock more;
                                // back off briefly and re-poll.
                                std::thread::sleep(Duration::from_millis(1));
                            }
                        }
                    }
                    debug!(worker, "worker stopped");
                });
            }
        });

        match first_error.into_inner() {
            Ok(Some(e)) => Err(e),
            Ok(None) => Ok(()),
            Err(poisoned) => Err(StrideError::LockPoisoned(format!(
                "executor error slot: {poisoned}"
            ))),
        }
    }
}

fn store_first(slot: &Mutex<Option<StrideError>>, error: StrideError) {
    if let Ok(mut guard) = slot.lock() {
        if guard.is_none() {
            *guard = Some(error);
        }
    }
}
