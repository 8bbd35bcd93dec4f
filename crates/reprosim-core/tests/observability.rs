//! Lifecycle events emitted while sweeping and checking records.

use reprosim_core::metrics::METRICS;
use reprosim_core::obs::{
    emit_record_persisted, emit_reproduction_checked, emit_sweep_aborted, emit_sweep_finished,
    emit_sweep_started, SweepSpan,
};
use reprosim_core::{check_reproduction, ModelRegistry, NoProgress, Scalar, SimRecord, Spans};
use tracing_test::traced_test;

fn record(model: &str) -> SimRecord {
    let spans: Spans = [("steps".to_string(), vec![Scalar::Int(20), Scalar::Int(40)])]
        .into_iter()
        .collect();
    SimRecord::new(model, spans, vec!["q".to_string(), "e".to_string()])
        .unwrap()
        .with_seed(3)
}

#[traced_test]
#[test]
fn test_emit_functions_log_event_names() {
    emit_sweep_started("urn:draw", 4, 2, "seeded(3)");
    emit_sweep_finished("urn:draw", 12, 8, 4);
    emit_reproduction_checked("abc", true, 0);
    emit_record_persisted("/tmp/sim.json", 128);
    emit_sweep_aborted("urn:draw", &"boom");

    assert!(logs_contain("sweep.started"));
    assert!(logs_contain("sweep.finished"));
    assert!(logs_contain("reproduction.checked"));
    assert!(logs_contain("record.persisted"));
    assert!(logs_contain("sweep.aborted"));
}

#[traced_test]
#[test]
fn test_sweep_span_enter() {
    let span = SweepSpan::enter("urn:draw", "digest");
    drop(span);
}

#[traced_test]
#[test]
fn test_run_emits_lifecycle_events() {
    let registry = ModelRegistry::with_builtins();
    let mut rec = record("urn:draw");
    rec.run(&registry, &mut NoProgress, None).unwrap();

    assert!(logs_contain("sweep.started"));
    assert!(logs_contain("sweep.finished"));
    assert!(logs_contain(&rec.config_digest()));
}

#[traced_test]
#[test]
fn test_failed_resolution_logs_nothing_started() {
    let registry = ModelRegistry::with_builtins();
    let mut rec = record("urn:missing");
    assert!(rec.run(&registry, &mut NoProgress, None).is_err());
    assert!(!logs_contain("sweep.started"));
}

#[traced_test]
#[test]
fn test_reproduction_check_is_counted_and_logged() {
    let registry = ModelRegistry::with_builtins();
    let mut rec = record("urn:draw");
    rec.run(&registry, &mut NoProgress, None).unwrap();

    let before = METRICS.reproduction_checks();
    let report = check_reproduction(&rec, &rec.clone());
    assert!(report.reproduced());
    assert!(METRICS.reproduction_checks() > before);
    assert!(logs_contain("reproduction.checked"));
    METRICS.flush();
}
