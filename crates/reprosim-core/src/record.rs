//! The persisted simulation record.
//!
//! A [`SimRecord`] is both the configuration of a sweep and, once run, its
//! archive: spans, model reference, output names, timestamp, seed or PRNG
//! state, and the aggregated result table. On disk it is one JSON object with
//! the `state` and `results` fields carried through the codec.

use std::io::Write;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use reprosim_codec::{CodecError, Dataset, Tagged};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use crate::aggregate::Aggregator;
use crate::digest::compute_digest;
use crate::error::{RecordError, Result, SweepError, ValidationError};
use crate::grid::{Grid, Spans};
use crate::metrics::METRICS;
use crate::model::{parse_reference, ModelRegistry};
use crate::obs::{self, SweepSpan};
use crate::prng::{prepare_stream, PreparedStream, PrngState, StreamOrigin};
use crate::progress::{CancelToken, Progress};
use crate::runner::SimulationRunner;
use crate::validation::SweepPlan;

pub const DEFAULT_REPLICATES: i64 = 1;

const REQUIRED_FIELDS: [&str; 4] = ["spans", "model", "timestamp", "outputs"];

fn default_replicates() -> i64 {
    DEFAULT_REPLICATES
}

/// How to treat a `state` or `results` field that fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Fail the whole load.
    #[default]
    Strict,
    /// Drop the field with a warning and keep the rest of the record.
    SkipMalformed,
}

/// What one completed sweep produced.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub results: Dataset,
    pub origin: StreamOrigin,
    /// Generator position before the first draw.
    pub initial_state: PrngState,
    /// Generator position after the last draw.
    pub terminal_state: PrngState,
    pub grid_points: usize,
    pub model_calls: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimRecord {
    spans: Spans,
    model: String,
    #[serde(with = "timestamp")]
    timestamp: DateTime<Utc>,
    outputs: Vec<String>,
    #[serde(default = "default_replicates")]
    replicates: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<PrngState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    results: Option<Dataset>,
}

impl SimRecord {
    /// Build a fresh record stamped with the current time.
    ///
    /// The model reference must be `module:function` shaped, at least one
    /// output is required, output names must be unique and span names
    /// non-empty. Checks that need the model's signature run in [`SimRecord::run`].
    pub fn new(
        model: impl Into<String>,
        spans: Spans,
        outputs: Vec<String>,
    ) -> std::result::Result<Self, RecordError> {
        let model = model.into();
        parse_reference(&model)?;
        if outputs.is_empty() {
            return Err(SweepError::from(ValidationError::NoOutputs).into());
        }
        for (i, name) in outputs.iter().enumerate() {
            if outputs[..i].contains(name) {
                return Err(
                    SweepError::from(ValidationError::DuplicateOutput(name.clone())).into(),
                );
            }
        }
        if spans.keys().any(String::is_empty) {
            return Err(SweepError::from(ValidationError::EmptySpanName).into());
        }

        Ok(Self {
            spans,
            model,
            timestamp: Utc::now(),
            outputs,
            replicates: DEFAULT_REPLICATES,
            seed: None,
            state: None,
            results: None,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replicates per grid point. Negative counts are rejected when the sweep runs.
    pub fn with_replicates(mut self, replicates: i64) -> Self {
        self.replicates = replicates;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Start the next sweep from a captured generator position.
    pub fn with_state(mut self, state: PrngState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn spans(&self) -> &Spans {
        &self.spans
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn replicates(&self) -> i64 {
        self.replicates
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn state(&self) -> Option<&PrngState> {
        self.state.as_ref()
    }

    pub fn results(&self) -> Option<&Dataset> {
        self.results.as_ref()
    }

    pub fn results_mut(&mut self) -> Option<&mut Dataset> {
        self.results.as_mut()
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    /// Reproduction-relevant configuration as JSON. Spans are listed as
    /// `[name, candidates]` pairs so their order survives key sorting.
    pub fn config_value(&self) -> Value {
        let spans: Vec<Value> = self
            .spans
            .iter()
            .map(|(name, values)| {
                json!([name, values.iter().map(|v| v.to_json()).collect::<Vec<_>>()])
            })
            .collect();
        json!({
            "spans": spans,
            "model": self.model,
            "timestamp": timestamp::format(&self.timestamp),
            "outputs": self.outputs,
            "seed": self.seed,
            "replicates": self.replicates,
        })
    }

    /// SHA-256 over the canonical form of [`SimRecord::config_value`].
    pub fn config_digest(&self) -> String {
        compute_digest(&self.config_value())
    }

    // -----------------------------------------------------------------------
    // Running
    // -----------------------------------------------------------------------

    /// Run the sweep and commit its results.
    ///
    /// On success `results` is replaced and, when no seed is set, `state`
    /// becomes the terminal generator position. On error the record is
    /// unchanged.
    pub fn run(
        &mut self,
        registry: &ModelRegistry,
        progress: &mut dyn Progress,
        cancel: Option<&CancelToken>,
    ) -> Result<SweepOutcome> {
        let outcome = self.sweep(registry, progress, cancel)?;
        self.results = Some(outcome.results.clone());
        if self.seed.is_none() {
            self.state = Some(outcome.terminal_state);
        }
        Ok(outcome)
    }

    /// Run the sweep without touching the record.
    pub fn sweep(
        &self,
        registry: &ModelRegistry,
        progress: &mut dyn Progress,
        cancel: Option<&CancelToken>,
    ) -> Result<SweepOutcome> {
        let model = registry.resolve(&self.model)?;
        SweepPlan {
            model: &self.model,
            signature: model.signature(),
            spans: &self.spans,
            outputs: &self.outputs,
            replicates: self.replicates,
        }
        .validate()?;
        let replicates = usize::try_from(self.replicates)
            .map_err(|_| ValidationError::NegativeReplicates(self.replicates))?;

        let digest = self.config_digest();
        let _span = SweepSpan::enter(&self.model, &digest);

        let PreparedStream {
            mut rng,
            origin,
            initial,
        } = prepare_stream(self.seed, self.state.as_ref());
        obs::emit_sweep_started(
            &self.model,
            Grid::new(&self.spans).len(),
            replicates,
            &origin.to_string(),
        );
        METRICS.inc_sweeps();
        let started = Instant::now();

        let mut runner =
            SimulationRunner::new(model.as_ref(), &self.spans, &self.outputs, replicates, &mut rng)
                .with_progress(progress);
        if let Some(cancel) = cancel {
            runner = runner.with_cancel(cancel);
        }

        let mut aggregator = Aggregator::new(&self.outputs);
        for record in runner.by_ref() {
            match record {
                Ok(record) => aggregator.push(record),
                Err(err) => {
                    obs::emit_sweep_aborted(&self.model, &err);
                    return Err(err);
                }
            }
        }
        let grid_points = runner.grid_points_completed();
        let model_calls = runner.model_calls();

        let results = aggregator.finish();
        let terminal_state = PrngState::capture(&rng);
        obs::emit_sweep_finished(
            &self.model,
            started.elapsed().as_millis() as u64,
            model_calls,
            results.len(),
        );

        Ok(SweepOutcome {
            results,
            origin,
            initial_state: initial,
            terminal_state,
            grid_points,
            model_calls,
        })
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn to_json_pretty(&self) -> std::result::Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, RecordError> {
        Self::from_json_with(text, DecodePolicy::Strict)
    }

    pub fn from_json_with(
        text: &str,
        policy: DecodePolicy,
    ) -> std::result::Result<Self, RecordError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value_with(value, policy)
    }

    /// Decode a record from a JSON tree. Codec failures are confined to the
    /// `state` or `results` field that caused them.
    pub fn from_value_with(
        value: Value,
        policy: DecodePolicy,
    ) -> std::result::Result<Self, RecordError> {
        let Value::Object(mut obj) = value else {
            return Err(RecordError::NotAnObject);
        };
        if let Some(field) = REQUIRED_FIELDS.iter().find(|f| !obj.contains_key(**f)) {
            return Err(RecordError::MissingField(*field));
        }

        let state = obj.remove("state").map(decode_state).transpose();
        let state = settle("state", state, policy)?.flatten();
        let results = obj.remove("results").map(decode_results).transpose();
        let results = settle("results", results, policy)?.flatten();

        let mut record: SimRecord = serde_json::from_value(Value::Object(obj))?;
        record.state = state;
        record.results = results;
        Ok(record)
    }

    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, RecordError> {
        Self::load_with(path, DecodePolicy::Strict)
    }

    pub fn load_with(
        path: impl AsRef<Path>,
        policy: DecodePolicy,
    ) -> std::result::Result<Self, RecordError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_with(&text, policy)
    }

    /// Write the record atomically: a temp file in the target directory is
    /// filled and then renamed over `path`.
    pub fn dump(&self, path: impl AsRef<Path>) -> std::result::Result<(), RecordError> {
        let path = path.as_ref();
        let mut text = self.to_json_pretty()?;
        text.push('\n');

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        obs::emit_record_persisted(&path.display().to_string(), text.len());
        Ok(())
    }
}

/// Equal when every configuration field matches; `results` and `state` are ignored.
/// Span order counts, since it fixes enumeration and draw order.
impl PartialEq for SimRecord {
    fn eq(&self, other: &Self) -> bool {
        self.spans.iter().eq(other.spans.iter())
            && self.model == other.model
            && self.timestamp == other.timestamp
            && self.outputs == other.outputs
            && self.seed == other.seed
            && self.replicates == other.replicates
    }
}

fn decode_state(value: Value) -> std::result::Result<Option<PrngState>, CodecError> {
    if value.is_null() {
        return Ok(None);
    }
    match Tagged::classify(value)? {
        Tagged::Array(arr) => PrngState::from_array(&arr).map(Some),
        _ => Err(CodecError::MalformedArray(
            "state is not a typed array".to_string(),
        )),
    }
}

fn decode_results(value: Value) -> std::result::Result<Option<Dataset>, CodecError> {
    if value.is_null() {
        return Ok(None);
    }
    match Tagged::classify(value)? {
        Tagged::Dataset(ds) => Ok(Some(ds)),
        _ => Err(CodecError::MalformedDataset(
            "results is not a record table".to_string(),
        )),
    }
}

fn settle<T>(
    field: &'static str,
    decoded: std::result::Result<Option<T>, CodecError>,
    policy: DecodePolicy,
) -> std::result::Result<Option<T>, RecordError> {
    match (decoded, policy) {
        (Ok(value), _) => Ok(value),
        (Err(source), DecodePolicy::Strict) => Err(RecordError::Codec { field, source }),
        (Err(source), DecodePolicy::SkipMalformed) => {
            tracing::warn!(field = field, error = %source, "dropping undecodable record field");
            Ok(None)
        }
    }
}

/// RFC 3339 timestamps. Space-separated `YYYY-MM-DD HH:MM:SS[.f]` values
/// without an offset are also accepted and read as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn parse(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(text) {
            Ok(ts) => Ok(ts.with_timezone(&Utc)),
            Err(_) => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive)),
        }
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(serde::de::Error::custom)
    }
}
