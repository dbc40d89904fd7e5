use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminates the kinds of work that can share a time step.
///
/// The numeric value fixes dispatch order among same-step jobs: lower kinds
/// run first. What each kind means is up to the dependency graph that mints
/// the ids (record reading, statistical calling, output writing, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobKind(pub u8);

/// Identifies one unit of work: a time step plus a kind tag.
///
/// JobIds are totally ordered step-major, kind-minor. The derived `Ord`
/// relies on the field order below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId {
    step: u64,
    kind: JobKind,
}

impl JobId {
    pub fn new(step: u64, kind: JobKind) -> Self {
        Self { step, kind }
    }

    /// The logical time step this job belongs to.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// The kind tag within the step.
    pub fn kind(&self) -> JobKind {
        self.kind
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.step, self.kind)
    }
}
