//! Replicate averaging.
//!
//! Records are grouped by every non-output field, and each output becomes the
//! arithmetic mean of the values present in its group. Groups come out in
//! first-seen order, which for runner output is grid enumeration order.

use indexmap::IndexMap;
use reprosim_codec::{Dataset, Record, Scalar, ScalarKey};

use crate::runner::ReplicateRecord;

/// Identity of a group: its input fields, sorted by name.
pub type GroupKey = Vec<(String, ScalarKey)>;

/// Grouping key of a row, ignoring the listed output columns.
pub fn group_key(fields: &Record, outputs: &[String]) -> GroupKey {
    let mut key: GroupKey = fields
        .iter()
        .filter(|(name, _)| !outputs.contains(*name))
        .map(|(name, value)| (name.clone(), value.key()))
        .collect();
    key.sort_by(|a, b| a.0.cmp(&b.0));
    key
}

struct Group {
    inputs: Record,
    sums: Vec<f64>,
    counts: Vec<usize>,
}

/// Streaming accumulator for replicate rows.
pub struct Aggregator<'a> {
    outputs: &'a [String],
    groups: IndexMap<GroupKey, Group>,
    rows: usize,
}

impl<'a> Aggregator<'a> {
    pub fn new(outputs: &'a [String]) -> Self {
        Self {
            outputs,
            groups: IndexMap::new(),
            rows: 0,
        }
    }

    pub fn push(&mut self, record: ReplicateRecord) {
        self.push_fields(record.fields);
    }

    /// Add a bare row. Missing or non-numeric output cells are skipped.
    pub fn push_fields(&mut self, fields: Record) {
        self.rows += 1;
        let outputs = self.outputs;
        let key = group_key(&fields, outputs);
        let group = self.groups.entry(key).or_insert_with(|| Group {
            inputs: fields
                .iter()
                .filter(|(name, _)| !outputs.contains(*name))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            sums: vec![0.0; outputs.len()],
            counts: vec![0; outputs.len()],
        });
        for (i, name) in outputs.iter().enumerate() {
            if let Some(x) = fields.get(name).and_then(Scalar::as_f64) {
                group.sums[i] += x;
                group.counts[i] += 1;
            }
        }
    }

    /// Rows pushed so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(self) -> Dataset {
        let outputs = self.outputs;
        let records = self
            .groups
            .into_values()
            .map(|group| {
                let mut row = Record::with_capacity(outputs.len() + group.inputs.len());
                for (i, name) in outputs.iter().enumerate() {
                    let mean = if group.counts[i] == 0 {
                        Scalar::Null
                    } else {
                        Scalar::Float(group.sums[i] / group.counts[i] as f64)
                    };
                    row.insert(name.clone(), mean);
                }
                row.extend(group.inputs);
                row
            })
            .collect();
        Dataset::new(records)
    }
}

/// Average a batch of replicate records in one call.
pub fn aggregate<I>(records: I, outputs: &[String]) -> Dataset
where
    I: IntoIterator<Item = ReplicateRecord>,
{
    let mut agg = Aggregator::new(outputs);
    for record in records {
        agg.push(record);
    }
    agg.finish()
}
