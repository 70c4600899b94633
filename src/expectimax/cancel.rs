use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Wall-clock deadline shared by every branch of one deepening round.
///
/// [`CancelToken::poll`] reads the clock and latches the flag once the
/// deadline has passed; [`CancelToken::is_cancelled`] is a single relaxed
/// load, cheap enough for every loop iteration of the search.
#[derive(Debug)]
pub struct CancelToken {
    deadline: Option<Instant>,
    cancelled: AtomicBool,
}

impl CancelToken {
    /// A token that fires `budget` from now.
    pub fn with_budget(budget: Duration) -> Self {
        Self { deadline: Instant::now().checked_add(budget), cancelled: AtomicBool::new(false) }
    }

    /// A token that only fires through [`CancelToken::cancel`].
    pub fn never() -> Self {
        Self { deadline: None, cancelled: AtomicBool::new(false) }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Check the deadline, latching cancellation if it has passed.
    #[inline]
    pub fn poll(&self) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_latches_on_poll() {
        let token = CancelToken::with_budget(Duration::ZERO);
        assert!(!token.is_cancelled());
        assert!(token.poll());
        assert!(token.is_cancelled());
    }

    #[test]
    fn never_fires_until_cancelled() {
        let token = CancelToken::never();
        assert!(!token.poll());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.poll());
    }

    #[test]
    fn long_budget_is_live() {
        let token = CancelToken::with_budget(Duration::from_secs(3600));
        assert!(!token.poll());
        assert!(!token.is_cancelled());
    }
}
