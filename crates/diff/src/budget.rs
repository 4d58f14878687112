use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::myers::EditScriptError;

/// Units of inner-loop work between two deadline/cancellation polls
pub const POLL_INTERVAL: usize = 4096;

/// A cooperative cancellation flag shared between a host and a running diff
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a new, not yet cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Time and cancellation budget of a computation
#[derive(Debug, Clone, Default)]
pub struct Budget {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl Budget {
    /// A budget that never runs out
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Stop at the given instant
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop when the token is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Check the budget right now
    pub fn check(&self) -> Result<(), EditScriptError> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(EditScriptError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(EditScriptError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    pub(crate) fn poller(&self) -> Poller<'_> {
        Poller {
            budget: self,
            steps: 0,
        }
    }
}

/// Amortises budget checks over hot loops
pub(crate) struct Poller<'a> {
    budget: &'a Budget,
    steps: usize,
}

impl Poller<'_> {
    /// Record `work` units and poll the budget once enough have accumulated
    pub(crate) fn tick(&mut self, work: usize) -> Result<(), EditScriptError> {
        self.steps += work;
        if self.steps >= POLL_INTERVAL {
            self.steps = 0;
            self.budget.check()?;
        }
        Ok(())
    }

    /// Poll unconditionally
    pub(crate) fn poll(&mut self) -> Result<(), EditScriptError> {
        self.steps = 0;
        self.budget.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let budget = Budget::unlimited().with_cancellation(token.clone());
        assert!(budget.check().is_ok());

        token.cancel();
        assert_eq!(budget.check(), Err(EditScriptError::Cancelled));
    }

    #[test]
    fn test_expired_deadline() {
        let budget = Budget::unlimited().with_deadline(Instant::now());
        assert_eq!(budget.check(), Err(EditScriptError::DeadlineExceeded));
    }

    #[test]
    fn test_poller_only_checks_after_interval() {
        let budget = Budget::unlimited().with_deadline(Instant::now());
        let mut poller = budget.poller();
        assert!(poller.tick(POLL_INTERVAL - 1).is_ok());
        assert_eq!(poller.tick(1), Err(EditScriptError::DeadlineExceeded));
    }
}
