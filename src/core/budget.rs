//! Bounded retry budget for the generate-validate loop.

/// Attempt counter against a fixed ceiling.
///
/// Invariant: `attempt <= max_attempts` while the loop continues. The counter
/// moves forward by exactly one per failed gate-chain cycle and resets to 1
/// when the workflow advances to a fresh staging environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    attempt: u32,
    max_attempts: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Derive a ceiling from the requirement count (1.5x, rounded up, min 1)
    /// when the caller does not supply one explicitly.
    pub fn derived(requirement_count: usize) -> Self {
        let max = (requirement_count as u32 * 3).div_ceil(2).max(1);
        Self::new(max)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// True when a failed cycle may loop back through regeneration.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Record a failed cycle. Callers must check [`Self::can_retry`] first;
    /// the counter saturates at the ceiling.
    pub fn increment(&mut self) {
        self.attempt = (self.attempt + 1).min(self.max_attempts);
    }

    /// Fresh budget for a new staging environment. Failures on a prior
    /// environment do not consume budget on the next.
    pub fn reset(&mut self) {
        self.attempt = 1;
    }
}
