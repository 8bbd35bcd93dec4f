//! Reproduction checks: does a re-run match what was archived?
//!
//! Rows are aligned by their input fields, not by position, and output cells
//! are compared exactly. NaN matches NaN and `null`, since non-finite means
//! are written as `null` on disk.

use std::fmt;

use indexmap::IndexMap;
use reprosim_codec::{Record, Scalar};
use serde::Serialize;

use crate::aggregate::{group_key, GroupKey};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::model::ModelRegistry;
use crate::obs;
use crate::progress::{CancelToken, Progress};
use crate::record::SimRecord;

/// One reason a re-run does not reproduce the stored record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    /// Spans, model, timestamp, outputs, seed or replicates differ.
    ConfigDiffers,
    MissingStoredResults,
    /// A stored row has no counterpart in the re-run.
    MissingRow { row: String },
    /// The re-run produced a row the stored table does not have.
    UnexpectedRow { row: String },
    ValueDiffers {
        row: String,
        column: String,
        stored: Scalar,
        rerun: Scalar,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigDiffers => f.write_str("configuration differs"),
            Self::MissingStoredResults => f.write_str("stored record has no results"),
            Self::MissingRow { row } => write!(f, "row [{row}] missing from re-run"),
            Self::UnexpectedRow { row } => write!(f, "row [{row}] not in stored results"),
            Self::ValueDiffers {
                row,
                column,
                stored,
                rerun,
            } => write!(f, "row [{row}] column {column}: stored {stored}, re-run {rerun}"),
        }
    }
}

/// Verdict of a reproduction check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReproductionReport {
    pub config_digest: String,
    pub stored_rows: usize,
    pub rerun_rows: usize,
    pub mismatches: Vec<Mismatch>,
}

impl ReproductionReport {
    pub fn reproduced(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compare a re-run against the stored record it was derived from.
pub fn check_reproduction(stored: &SimRecord, rerun: &SimRecord) -> ReproductionReport {
    let outputs = stored.outputs();
    let mut mismatches = Vec::new();
    if stored != rerun {
        mismatches.push(Mismatch::ConfigDiffers);
    }

    let stored_rows = stored.results().map(|ds| ds.records()).unwrap_or_default();
    let rerun_rows = rerun.results().map(|ds| ds.records()).unwrap_or_default();
    if stored.results().is_none() {
        mismatches.push(Mismatch::MissingStoredResults);
    }

    let mut fresh: IndexMap<GroupKey, &Record> = rerun_rows
        .iter()
        .map(|row| (group_key(row, outputs), row))
        .collect();

    for row in stored_rows {
        let label = describe(row, outputs);
        let Some(other) = fresh.shift_remove(&group_key(row, outputs)) else {
            mismatches.push(Mismatch::MissingRow { row: label });
            continue;
        };
        for column in outputs {
            let a = row.get(column).cloned().unwrap_or(Scalar::Null);
            let b = other.get(column).cloned().unwrap_or(Scalar::Null);
            if !cells_equal(&a, &b) {
                mismatches.push(Mismatch::ValueDiffers {
                    row: label.clone(),
                    column: column.clone(),
                    stored: a,
                    rerun: b,
                });
            }
        }
    }
    for row in fresh.values() {
        mismatches.push(Mismatch::UnexpectedRow {
            row: describe(row, outputs),
        });
    }

    let report = ReproductionReport {
        config_digest: stored.config_digest(),
        stored_rows: stored_rows.len(),
        rerun_rows: rerun_rows.len(),
        mismatches,
    };
    METRICS.inc_reproduction_checks();
    obs::emit_reproduction_checked(
        &report.config_digest,
        report.reproduced(),
        report.mismatches.len(),
    );
    report
}

/// Re-run a copy of `stored` and check it. The stored record is not modified;
/// the re-run copy is returned so a divergent run can be saved elsewhere.
pub fn reproduce(
    stored: &SimRecord,
    registry: &ModelRegistry,
    progress: &mut dyn Progress,
    cancel: Option<&CancelToken>,
) -> Result<(ReproductionReport, SimRecord)> {
    let mut rerun = stored.clone();
    rerun.run(registry, progress, cancel)?;
    let report = check_reproduction(stored, &rerun);
    Ok((report, rerun))
}

fn cells_equal(a: &Scalar, b: &Scalar) -> bool {
    let missing = |s: &Scalar| s.is_null() || s.as_f64().map_or(false, f64::is_nan);
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if !x.is_nan() && !y.is_nan() => x == y,
        _ => (missing(a) && missing(b)) || a == b,
    }
}

fn describe(row: &Record, outputs: &[String]) -> String {
    row.iter()
        .filter(|(name, _)| !outputs.contains(*name))
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}
