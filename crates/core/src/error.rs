use thiserror::Error;

use crate::id::JobId;

/// Failure raised by a job's own computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct JobError(pub String);

impl JobError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum StrideError {
    /// A time step was requested outside the admission window. Always fatal:
    /// the dependency graph promised readiness without checking admissibility.
    #[error("Time invalid: current={current} t={t} lookAhead={look_ahead} mDelta={delta}")]
    TimeInvalid {
        current: u64,
        t: u64,
        look_ahead: u64,
        delta: u64,
    },

    /// Graph wiring bug: ordering invariant broken, a buffered result missing
    /// for a completed predecessor, or residual state at end of run.
    #[error("Graph integrity violated: {0}")]
    GraphIntegrity(String),

    /// A job's computation failed. Terminal for the run; no retry.
    #[error("Job {id} failed: {source}")]
    JobFailed {
        id: JobId,
        #[source]
        source: JobError,
    },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type Result<T> = std::result::Result<T, StrideError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::JobKind;

    #[test]
    fn time_invalid_message_format() {
        let err = StrideError::TimeInvalid {
            current: 3,
            t: 7,
            look_ahead: 3,
            delta: 0,
        };
        assert_eq!(err.to_string(), "Time invalid: current=3 t=7 lookAhead=3 mDelta=0");
    }

    #[test]
    fn job_failed_preserves_cause() {
        use std::error::Error as _;

        let err = StrideError::JobFailed {
            id: JobId::new(2, JobKind(1)),
            source: JobError::new("boom"),
        };
        let cause = err.source().expect("cause attached");
        assert_eq!(cause.to_string(), "boom");
    }
}
