//! Dependency-driven job scheduler with a bounded lookahead window.
//!
//! A long computation is partitioned into a totally-ordered sequence of time
//! steps, each producing a few typed jobs with cross-step dependencies. The
//! [`Scheduler`] admits jobs from a [`DependencyGraph`] under a
//! [`LookAheadWindow`] admission bound (caps in-flight memory), buffers
//! results in an [`EventBuffer`] until every dependent has consumed them,
//! and is driven by one of three interchangeable executors — sequential,
//! seeded-random simulation, or a real worker-thread pool — which must all
//! agree on final accumulated state.

pub mod buffer;
pub mod executor;
pub mod graph;
pub mod job;
pub mod scheduler;
pub mod stats;
pub mod types;
pub mod window;

pub use buffer::EventBuffer;
pub use executor::{ConcurrentExecutor, RandomizedExecutor, SequentialExecutor};
pub use graph::{ChunkGraph, DependencyGraph};
pub use job::{Job, JobFactory};
pub use scheduler::Scheduler;
pub use stats::{now_nanos, NullSink, RunStatistics, StatisticsSink, TraceSink};
pub use types::{Completion, Phase, SchedulerConfig};
pub use window::LookAheadWindow;
