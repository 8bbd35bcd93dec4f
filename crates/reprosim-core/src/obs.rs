//! Structured lifecycle events for sweeps, records and reproduction checks.
//!
//! Events are emitted at `info!` level with an `event` field naming the
//! lifecycle step, so they can be filtered with `RUST_LOG` or consumed as
//! JSON lines when the subscriber is built with `json = true`.

use tracing::info;

/// RAII guard holding a sweep-scoped tracing span.
///
/// ```ignore
/// let _span = SweepSpan::enter("urn:draw", &digest);
/// // every event until the guard drops carries model and config_digest
/// ```
pub struct SweepSpan {
    _span: tracing::span::EnteredSpan,
}

impl SweepSpan {
    pub fn enter(model: &str, config_digest: &str) -> Self {
        let span = tracing::info_span!(
            "reprosim.sweep",
            model = %model,
            config_digest = %config_digest
        );
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: sweep started.
pub fn emit_sweep_started(model: &str, grid_points: usize, replicates: usize, origin: &str) {
    info!(
        event = "sweep.started",
        model = %model,
        grid_points = grid_points,
        replicates = replicates,
        prng = %origin,
    );
}

pub fn emit_grid_point_completed(index: usize, total: usize) {
    tracing::debug!(event = "sweep.grid_point_completed", index = index, total = total);
}

/// Emit event: sweep finished and results aggregated.
pub fn emit_sweep_finished(model: &str, duration_ms: u64, model_calls: u64, rows: usize) {
    info!(
        event = "sweep.finished",
        model = %model,
        duration_ms = duration_ms,
        model_calls = model_calls,
        rows = rows,
    );
}

/// Emit event: sweep aborted (warning level). Nothing is committed to the record.
pub fn emit_sweep_aborted(model: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "sweep.aborted", model = %model, error = %error);
}

pub fn emit_reproduction_checked(config_digest: &str, reproduced: bool, mismatches: usize) {
    info!(
        event = "reproduction.checked",
        config_digest = %config_digest,
        reproduced = reproduced,
        mismatches = mismatches,
    );
}

pub fn emit_record_persisted(path: &str, bytes: usize) {
    info!(event = "record.persisted", path = %path, bytes = bytes);
}
