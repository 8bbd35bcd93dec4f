//! Progress reporting and cooperative cancellation for a running sweep.
//!
//! Both are polled at grid-point granularity only: a replicate batch is
//! never interrupted half way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Observer advanced once per completed grid point.
pub trait Progress {
    fn start(&mut self, total: usize);
    fn advance(&mut self);
    fn finish(&mut self);
}

/// Progress sink that ignores every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&mut self, _total: usize) {}
    fn advance(&mut self) {}
    fn finish(&mut self) {}
}

/// Logs a percentage line through `tracing` every time another
/// `step_percent` of the grid has completed.
#[derive(Debug, Clone)]
pub struct LogProgress {
    total: usize,
    done: usize,
    step_percent: usize,
    last_logged: usize,
}

impl LogProgress {
    pub fn new(step_percent: usize) -> Self {
        Self {
            total: 0,
            done: 0,
            step_percent: step_percent.clamp(1, 100),
            last_logged: 0,
        }
    }

    pub fn done(&self) -> usize {
        self.done
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Progress for LogProgress {
    fn start(&mut self, total: usize) {
        self.total = total;
        self.done = 0;
        self.last_logged = 0;
        tracing::info!(total = total, "sweep progress started");
    }

    fn advance(&mut self) {
        self.done += 1;
        if self.total == 0 {
            return;
        }
        let percent = self.done * 100 / self.total;
        if percent >= self.last_logged + self.step_percent || self.done == self.total {
            self.last_logged = percent;
            tracing::info!(
                done = self.done,
                total = self.total,
                percent = percent,
                "sweep progress"
            );
        }
    }

    fn finish(&mut self) {
        tracing::debug!(done = self.done, total = self.total, "sweep progress finished");
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_log_progress_counts_advances() {
        let mut p = LogProgress::new(25);
        p.start(8);
        for _ in 0..8 {
            p.advance();
        }
        p.finish();
        assert_eq!(p.done(), 8);
    }

    #[test]
    fn test_log_progress_handles_empty_grid() {
        let mut p = LogProgress::default();
        p.start(0);
        p.finish();
        assert_eq!(p.done(), 0);
    }
}
