use std::collections::BTreeMap;

use stride_core::{Result, StrideError};

/// Sliding admission window over time steps: the backpressure mechanism.
///
/// Tracks a multiset of in-flight step values (a step appears once per
/// dispatched-but-incomplete job at that step) and bounds how far ahead of
/// the current minimum new work may be admitted. This caps memory: the
/// fastest-progressing job kind can never race more than `look_ahead + delta`
/// steps past the slowest.
///
/// Mutated only on the scheduler's single serialized bookkeeping path.
#[derive(Debug, Clone)]
pub struct LookAheadWindow {
    look_ahead: u64,
    delta: u64,
    /// step -> number of in-flight jobs at that step.
    in_flight: BTreeMap<u64, usize>,
}

impl LookAheadWindow {
    pub fn new(look_ahead: u64, delta: u64) -> Self {
        Self {
            look_ahead,
            delta,
            in_flight: BTreeMap::new(),
        }
    }

    /// The minimum in-flight step, or `None` when nothing is in flight.
    pub fn current(&self) -> Option<u64> {
        self.in_flight.keys().next().copied()
    }

    /// Whether step `t` may be admitted given extra slack `d`.
    ///
    /// An empty window admits any step; otherwise `t` must fall in
    /// `[current, current + look_ahead + d]`.
    pub fn admits(&self, t: u64, d: u64) -> bool {
        match self.current() {
            None => true,
            Some(cur) => cur <= t && t <= cur + self.look_ahead + d,
        }
    }

    /// Admit one occurrence of step `t`.
    ///
    /// Fails with [`StrideError::TimeInvalid`] when `t` violates the bound
    /// against the current minimum, using the window's own delta. That error
    /// is fatal: it means the dependency graph handed out an id it never
    /// checked for admissibility.
    pub fn increment(&mut self, t: u64) -> Result<()> {
        if !self.admits(t, self.delta) {
            // admits() returned false, so the window is non-empty here.
            let current = self.current().unwrap_or(0);
            return Err(StrideError::TimeInvalid {
                current,
                t,
                look_ahead: self.look_ahead,
                delta: self.delta,
            });
        }
        *self.in_flight.entry(t).or_insert(0) += 1;
        Ok(())
    }

    /// Retire one occurrence of step `t`.
    ///
    /// When the minimum step's last occurrence retires, the minimum advances
    /// to the next occupied step (gaps are skipped); when the window empties
    /// completely, `current()` is undefined until the next increment.
    pub fn decrement(&mut self, t: u64) -> Result<()> {
        match self.in_flight.get_mut(&t) {
            Some(count) if *count > 1 => {
                *count -= 1;
            }
            Some(_) => {
                self.in_flight.remove(&t);
            }
            None => {
                return Err(StrideError::GraphIntegrity(format!(
                    "decrement of step {t} with no in-flight occurrence"
                )));
            }
        }
        Ok(())
    }

    /// Total in-flight count across all steps.
    pub fn total(&self) -> usize {
        self.in_flight.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn look_ahead(&self) -> u64 {
        self.look_ahead
    }

    pub fn delta(&self) -> u64 {
        self.delta
    }

    /// Multiplicities must all be positive; a zero-count bucket means the
    /// increment/decrement bookkeeping went wrong.
    pub fn check_integrity(&self) -> Result<()> {
        for (&t, &count) in &self.in_flight {
            if count == 0 {
                return Err(StrideError::GraphIntegrity(format!(
                    "window holds empty bucket for step {t}"
                )));
            }
        }
        Ok(())
    }
}
