//! Progress reporting and cooperative cancellation (C15, ambient).
//!
//! Progress is a synchronous callback invoked from the solving thread
//! — implementations must be cheap and non-blocking, per §4.11 and
//! §9's design note on the callback-driven-progress contract. There
//! are no background threads anywhere in this crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Invoked synchronously from the solve thread with a monotonically
/// non-decreasing fraction in `[0, 1]`.
pub trait ProgressSink {
    fn report(&mut self, fraction: f64);
}

/// The default sink for callers that do not need progress.
pub struct NoOpProgress;

impl ProgressSink for NoOpProgress {
    fn report(&mut self, _fraction: f64) {}
}

impl<F: FnMut(f64)> ProgressSink for F {
    fn report(&mut self, fraction: f64) {
        self(fraction)
    }
}

/// A cheap, `Arc`-shared cooperative cancellation flag. Polled at the
/// checkpoints named in §5: the top of each element iteration, each
/// Newton iteration, each time step, and before each linear solve.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_is_shared_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn closure_progress_sink_is_invoked() {
        let mut seen = Vec::new();
        {
            let mut sink = |f: f64| seen.push(f);
            sink.report(0.5);
            sink.report(1.0);
        }
        assert_eq!(seen, vec![0.5, 1.0]);
    }
}
