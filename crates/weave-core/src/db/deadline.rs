//! Per-call time budget for store operations.

use std::time::{Duration, Instant};

use crate::error::{Result, WorkflowError};

/// Budget applied to a store call when none is configured.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(3);

/// A fixed time budget started at the beginning of one store call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    #[must_use]
    pub fn start(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Fail `op` with [`WorkflowError::Timeout`] once the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` when the deadline has passed.
    pub fn check(&self, op: &'static str) -> Result<()> {
        if self.is_expired() {
            return Err(WorkflowError::Timeout {
                op,
                budget: self.budget,
            });
        }
        Ok(())
    }
}
