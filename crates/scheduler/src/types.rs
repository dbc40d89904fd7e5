use serde::{Deserialize, Serialize};
use stride_core::JobId;

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Nothing dispatched yet.
    Idle,
    /// Jobs in flight and more available.
    Running,
    /// No candidate right now; in-flight jobs still owe completions.
    Draining,
    /// Window empty and graph exhausted.
    Done,
}

/// A finished job handed back to the scheduler by a driver.
#[derive(Debug)]
pub struct Completion<R> {
    pub id: JobId,
    pub result: R,
    /// Wall-clock completion time in nanoseconds.
    pub nanos: i64,
}

impl<R> Completion<R> {
    pub fn new(id: JobId, result: R, nanos: i64) -> Self {
        Self { id, result, nanos }
    }
}

/// Scheduler configuration, typically parsed from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How many steps past the minimum in-flight step may be admitted.
    #[serde(default = "default_look_ahead")]
    pub look_ahead: u64,
    /// Extra admission slack on top of the lookahead.
    #[serde(default)]
    pub delta: u64,
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default)]
    pub worker_threads: usize,
    /// Seed for the randomized driver.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_look_ahead() -> u64 {
    4
}

fn default_seed() -> u64 {
    42
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            look_ahead: default_look_ahead(),
            delta: 0,
            worker_threads: 0,
            seed: default_seed(),
        }
    }
}

impl SchedulerConfig {
    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.look_ahead, 4);
        assert_eq!(config.delta, 0);
        assert_eq!(config.worker_threads, 0);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn resolved_worker_threads() {
        let mut config = SchedulerConfig::default();
        assert!(config.resolved_worker_threads() > 0);

        config.worker_threads = 8;
        assert_eq!(config.resolved_worker_threads(), 8);
    }

    #[test]
    fn parses_partial_toml() {
        let config: SchedulerConfig = toml::from_str("look_ahead = 2\nworker_threads = 3\n").unwrap();
        assert_eq!(config.look_ahead, 2);
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.delta, 0, "missing fields fall back to defaults");
        assert_eq!(config.seed, 42);
    }
}
