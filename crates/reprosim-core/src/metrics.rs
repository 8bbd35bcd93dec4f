//! Process-wide sweep counters.
//!
//! Counters are bumped silently where the work happens. [`Metrics::flush`]
//! reports them as a single `info!` event, typically once per command.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

/// Relaxed atomic counters.
pub struct Metrics {
    sweeps_run: AtomicU64,
    grid_points_completed: AtomicU64,
    model_calls: AtomicU64,
    reproduction_checks: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            sweeps_run: AtomicU64::new(0),
            grid_points_completed: AtomicU64::new(0),
            model_calls: AtomicU64::new(0),
            reproduction_checks: AtomicU64::new(0),
        }
    }

    pub fn inc_sweeps(&self) {
        self.sweeps_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_grid_points(&self) {
        self.grid_points_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_model_calls(&self, n: u64) {
        self.model_calls.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_reproduction_checks(&self) {
        self.reproduction_checks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reproduction_checks", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            sweeps_run = self.sweeps_run(),
            grid_points_completed = self.grid_points_completed(),
            model_calls = self.model_calls(),
            reproduction_checks = self.reproduction_checks(),
        );
    }

    pub fn sweeps_run(&self) -> u64 {
        self.sweeps_run.load(Ordering::Relaxed)
    }

    pub fn grid_points_completed(&self) -> u64 {
        self.grid_points_completed.load(Ordering::Relaxed)
    }

    pub fn model_calls(&self) -> u64 {
        self.model_calls.load(Ordering::Relaxed)
    }

    pub fn reproduction_checks(&self) -> u64 {
        self.reproduction_checks.load(Ordering::Relaxed)
    }

    /// Zero every counter (for tests).
    pub fn reset(&self) {
        self.sweeps_run.store(0, Ordering::Relaxed);
        self.grid_points_completed.store(0, Ordering::Relaxed);
        self.model_calls.store(0, Ordering::Relaxed);
        self.reproduction_checks.store(0, Ordering::Relaxed);
    }
}
