//! Sequential sweep execution.
//!
//! [`SimulationRunner`] walks the grid in enumeration order and, for each
//! grid point, calls the model once per replicate with the shared PRNG. It is
//! a lazy iterator of [`ReplicateRecord`]s; the first error ends the stream.

use std::collections::VecDeque;

use reprosim_codec::{Record, Scalar};

use crate::error::{Result, SweepError};
use crate::grid::{Grid, GridIter, GridPoint, Spans};
use crate::metrics::METRICS;
use crate::model::Model;
use crate::obs;
use crate::prng::SimRng;
use crate::progress::{CancelToken, Progress};

/// One model call's outputs together with the inputs that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateRecord {
    /// Enumeration index of the originating grid point.
    pub grid_point: usize,
    /// Replicate index within the grid point, dropped before aggregation.
    pub replicate: usize,
    /// Output columns first, in declared order, then every bound input.
    pub fields: Record,
}

pub struct SimulationRunner<'a> {
    model: &'a dyn Model,
    points: GridIter<'a>,
    outputs: &'a [String],
    replicates: usize,
    rng: &'a mut SimRng,
    progress: Option<&'a mut dyn Progress>,
    cancel: Option<&'a CancelToken>,
    total: usize,
    completed: usize,
    model_calls: u64,
    pending: VecDeque<ReplicateRecord>,
    started: bool,
    done: bool,
}

impl<'a> SimulationRunner<'a> {
    pub fn new(
        model: &'a dyn Model,
        spans: &'a Spans,
        outputs: &'a [String],
        replicates: usize,
        rng: &'a mut SimRng,
    ) -> Self {
        let grid = Grid::new(spans);
        Self {
            model,
            points: grid.iter(),
            outputs,
            replicates,
            rng,
            progress: None,
            cancel: None,
            total: grid.len(),
            completed: 0,
            model_calls: 0,
            pending: VecDeque::new(),
            started: false,
            done: false,
        }
    }

    pub fn with_progress(mut self, progress: &'a mut dyn Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Grid points whose full replicate batch has run.
    pub fn grid_points_completed(&self) -> usize {
        self.completed
    }

    pub fn model_calls(&self) -> u64 {
        self.model_calls
    }

    /// Run every replicate of one grid point into `pending`.
    fn run_batch(&mut self, point: GridPoint) -> Result<()> {
        let args = self
            .model
            .signature()
            .bind(&point.bindings)
            .map_err(|source| SweepError::Model {
                grid_point: point.index,
                replicate: 0,
                source,
            })?;

        for replicate in 0..self.replicates {
            let values = self
                .model
                .call(&args, self.rng)
                .map_err(|source| SweepError::Model {
                    grid_point: point.index,
                    replicate,
                    source,
                })?;
            self.model_calls += 1;
            METRICS.add_model_calls(1);

            if values.len() != self.outputs.len() {
                return Err(SweepError::OutputArityMismatch {
                    expected: self.outputs.len(),
                    actual: values.len(),
                });
            }

            let mut fields = Record::with_capacity(self.outputs.len() + args.len());
            for (name, value) in self.outputs.iter().zip(values) {
                fields.insert(name.clone(), Scalar::Float(value));
            }
            for (name, value) in &args {
                fields.insert(name.clone(), value.clone());
            }
            self.pending.push_back(ReplicateRecord {
                grid_point: point.index,
                replicate,
                fields,
            });
        }

        Ok(())
    }

    fn finish(&mut self) {
        self.done = true;
        if let Some(progress) = self.progress.as_deref_mut() {
            progress.finish();
        }
    }
}

impl Iterator for SimulationRunner<'_> {
    type Item = Result<ReplicateRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            if let Some(progress) = self.progress.as_deref_mut() {
                progress.start(self.total);
            }
        }

        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }

            let Some(point) = self.points.next() else {
                self.finish();
                return None;
            };

            if self.cancel.map_or(false, CancelToken::is_cancelled) {
                self.done = true;
                return Some(Err(SweepError::Cancelled {
                    completed: self.completed,
                    total: self.total,
                }));
            }

            if let Err(err) = self.run_batch(point) {
                self.pending.clear();
                self.done = true;
                return Some(Err(err));
            }

            self.completed += 1;
            METRICS.inc_grid_points();
            obs::emit_grid_point_completed(self.completed - 1, self.total);
            if let Some(progress) = self.progress.as_deref_mut() {
                progress.advance();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::grid::Bindings;
    use crate::model::{arg_f64, FnModel, ModelSignature, ParamSpec};
    use rand::{Rng, SeedableRng};

    fn spans(entries: &[(&str, Vec<Scalar>)]) -> Spans {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn outputs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn noisy() -> impl Model {
        FnModel::new(
            ModelSignature::new()
                .param(ParamSpec::required("a"))
                .param(ParamSpec::optional("scale", 1.0))
                .with_rng(),
            |args: &Bindings, rng: &mut SimRng| {
                let a = arg_f64(args, "a")?;
                let scale = arg_f64(args, "scale")?;
                let u: f64 = rng.gen();
                Ok(vec![a + scale * u, a])
            },
        )
    }

    #[derive(Default)]
    struct Recorder {
        total: Option<usize>,
        advances: usize,
        finished: bool,
    }

    impl Progress for Recorder {
        fn start(&mut self, total: usize) {
            self.total = Some(total);
        }
        fn advance(&mut self) {
            self.advances += 1;
        }
        fn finish(&mut self) {
            self.finished = true;
        }
    }

    #[test]
    fn test_records_carry_outputs_then_inputs() {
        let model = noisy();
        let s = spans(&[("a", vec![Scalar::Int(1), Scalar::Int(2)])]);
        let out = outputs(&["y", "x"]);
        let mut rng = SimRng::seed_from_u64(5);
        let records: Vec<ReplicateRecord> = SimulationRunner::new(&model, &s, &out, 3, &mut rng)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(records.len(), 6);
        let cols: Vec<&str> = records[0].fields.keys().map(String::as_str).collect();
        assert_eq!(cols, vec!["y", "x", "a", "scale"]);
        assert_eq!(records[0].fields["scale"], Scalar::Float(1.0));
        let order: Vec<(usize, usize)> = records
            .iter()
            .map(|r| (r.grid_point, r.replicate))
            .collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_draws_follow_enumeration_order() {
        let model = noisy();
        let s = spans(&[("a", vec![Scalar::Int(0), Scalar::Int(10)])]);
        let out = outputs(&["y", "x"]);
        let mut rng = SimRng::seed_from_u64(9);
        let ys: Vec<f64> = SimulationRunner::new(&model, &s, &out, 2, &mut rng)
            .map(|r| r.unwrap().fields["y"].as_f64().unwrap())
            .collect();

        let mut reference = SimRng::seed_from_u64(9);
        let expected: Vec<f64> = [0.0, 0.0, 10.0, 10.0]
            .iter()
            .map(|a| a + reference.gen::<f64>())
            .collect();
        assert_eq!(ys, expected);
    }

    #[test]
    fn test_arity_mismatch_stops_the_stream() {
        let model = FnModel::new(
            ModelSignature::new().param(ParamSpec::required("a")),
            |_: &Bindings, _: &mut SimRng| Ok::<_, ModelError>(vec![1.0, 2.0, 3.0]),
        );
        let s = spans(&[("a", vec![Scalar::Int(1), Scalar::Int(2)])]);
        let out = outputs(&["q", "e"]);
        let mut rng = SimRng::seed_from_u64(1);
        let mut runner = SimulationRunner::new(&model, &s, &out, 2, &mut rng);

        assert!(matches!(
            runner.next(),
            Some(Err(SweepError::OutputArityMismatch {
                expected: 2,
                actual: 3
            }))
        ));
        assert!(runner.next().is_none());
    }

    #[test]
    fn test_model_error_carries_position() {
        let model = FnModel::new(
            ModelSignature::new().param(ParamSpec::required("a")),
            |args: &Bindings, _: &mut SimRng| {
                if arg_f64(args, "a")? > 1.0 {
                    Err(ModelError::Failed("boom".to_string()))
                } else {
                    Ok(vec![0.0])
                }
            },
        );
        let s = spans(&[("a", vec![Scalar::Int(1), Scalar::Int(2)])]);
        let out = outputs(&["q"]);
        let mut rng = SimRng::seed_from_u64(1);
        let results: Vec<Result<ReplicateRecord>> =
            SimulationRunner::new(&model, &s, &out, 1, &mut rng).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            &results[1],
            Err(SweepError::Model {
                grid_point: 1,
                replicate: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_calls_before_a_failure_are_counted() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = AtomicUsize::new(0);
        let model = FnModel::new(
            ModelSignature::new().param(ParamSpec::required("a")),
            |_: &Bindings, _: &mut SimRng| {
                if calls.fetch_add(1, Ordering::SeqCst) == 2 {
                    Err(ModelError::Failed("third call".to_string()))
                } else {
                    Ok(vec![0.0])
                }
            },
        );
        let s = spans(&[("a", vec![Scalar::Int(1)])]);
        let out = outputs(&["q"]);
        let mut rng = SimRng::seed_from_u64(1);

        let before = METRICS.model_calls();
        let mut runner = SimulationRunner::new(&model, &s, &out, 4, &mut rng);
        assert!(matches!(
            runner.next(),
            Some(Err(SweepError::Model { replicate: 2, .. }))
        ));
        assert_eq!(runner.model_calls(), 2);
        assert_eq!(runner.grid_points_completed(), 0);
        assert!(METRICS.model_calls() - before >= 2);
    }

    #[test]
    fn test_progress_advances_once_per_grid_point() {
        let model = noisy();
        let s = spans(&[("a", vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)])]);
        let out = outputs(&["y", "x"]);
        let mut rng = SimRng::seed_from_u64(2);
        let mut recorder = Recorder::default();
        let n = SimulationRunner::new(&model, &s, &out, 4, &mut rng)
            .with_progress(&mut recorder)
            .count();
        assert_eq!(n, 12);
        assert_eq!(recorder.total, Some(3));
        assert_eq!(recorder.advances, 3);
        assert!(recorder.finished);
    }

    #[test]
    fn test_cancel_before_first_point() {
        let model = noisy();
        let s = spans(&[("a", vec![Scalar::Int(1)])]);
        let out = outputs(&["y", "x"]);
        let mut rng = SimRng::seed_from_u64(2);
        let before = crate::prng::PrngState::capture(&rng);
        let cancel = CancelToken::new();
        cancel.cancel();
        let first = SimulationRunner::new(&model, &s, &out, 2, &mut rng)
            .with_cancel(&cancel)
            .next();
        assert!(matches!(
            first,
            Some(Err(SweepError::Cancelled {
                completed: 0,
                total: 1
            }))
        ));
        assert_eq!(crate::prng::PrngState::capture(&rng), before);
    }

    #[test]
    fn test_zero_replicates_calls_nothing() {
        let model = noisy();
        let s = spans(&[("a", vec![Scalar::Int(1), Scalar::Int(2)])]);
        let out = outputs(&["y", "x"]);
        let mut rng = SimRng::seed_from_u64(2);
        let mut runner = SimulationRunner::new(&model, &s, &out, 0, &mut rng);
        assert!(runner.next().is_none());
        assert_eq!(runner.grid_points_completed(), 2);
        assert_eq!(runner.model_calls(), 0);
    }
}
