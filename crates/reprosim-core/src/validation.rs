//! Up-front sweep checks. Everything here runs before the PRNG is touched.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::grid::Spans;
use crate::model::ModelSignature;

/// Inputs of one sweep that can be checked without running anything.
#[derive(Debug, Clone, Copy)]
pub struct SweepPlan<'a> {
    pub model: &'a str,
    pub signature: &'a ModelSignature,
    pub spans: &'a Spans,
    pub outputs: &'a [String],
    pub replicates: i64,
}

impl SweepPlan<'_> {
    /// Check the plan; the first problem found is returned.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.replicates < 0 {
            return Err(ValidationError::NegativeReplicates(self.replicates));
        }
        if self.outputs.is_empty() {
            return Err(ValidationError::NoOutputs);
        }

        let mut seen = HashSet::with_capacity(self.outputs.len());
        for output in self.outputs {
            if !seen.insert(output.as_str()) {
                return Err(ValidationError::DuplicateOutput(output.clone()));
            }
            if self.signature.get(output).is_some() || self.spans.contains_key(output) {
                return Err(ValidationError::OutputShadowsParameter(output.clone()));
            }
        }

        for name in self.spans.keys() {
            if name.is_empty() {
                return Err(ValidationError::EmptySpanName);
            }
            if self.signature.get(name).is_none() {
                return Err(ValidationError::UnknownParameter {
                    model: self.model.to_string(),
                    name: name.clone(),
                });
            }
        }

        for spec in &self.signature.params {
            if spec.is_required() && !self.spans.contains_key(&spec.name) {
                return Err(ValidationError::MissingParameter {
                    model: self.model.to_string(),
                    name: spec.name.clone(),
                });
            }
        }

        for (name, candidates) in self.spans {
            let numeric = self.signature.get(name).map_or(false, |p| p.numeric);
            if !numeric {
                continue;
            }
            if let Some(bad) = candidates.iter().find(|v| !v.is_numeric()) {
                return Err(ValidationError::NonNumericCandidate {
                    name: name.clone(),
                    value: bad.to_string(),
                });
            }
        }

        Ok(())
    }
}
