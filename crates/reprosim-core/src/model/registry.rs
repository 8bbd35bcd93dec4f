//! Explicit `module:function` model registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{urn, Model, ModelSignature};
use crate::error::{Result, SweepError};

/// Split a `module:function` reference into its two halves.
///
/// Exactly one `:` is allowed, both sides must be non-empty, and neither may
/// contain whitespace.
pub fn parse_reference(reference: &str) -> Result<(&str, &str)> {
    let malformed = |reason: &str| SweepError::ModelResolution {
        reference: reference.to_string(),
        reason: reason.to_string(),
    };
    let (module, function) = reference
        .split_once(':')
        .ok_or_else(|| malformed("expected module:function"))?;
    if function.contains(':') {
        return Err(malformed("more than one ':' separator"));
    }
    if module.is_empty() || function.is_empty() {
        return Err(malformed("module and function must both be non-empty"));
    }
    if reference.chars().any(char::is_whitespace) {
        return Err(malformed("reference must not contain whitespace"));
    }
    Ok((module, function))
}

/// Map from model reference to a shared model instance.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<dyn Model>>,
}

impl ModelRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the bundled models.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.models.insert(
            urn::REFERENCE.to_string(),
            Arc::new(urn::UrnDraw::new()) as Arc<dyn Model>,
        );
        registry
    }

    /// Add a model under `reference`. Duplicate and malformed references are rejected.
    pub fn register(&mut self, reference: &str, model: impl Model + 'static) -> Result<()> {
        parse_reference(reference)?;
        if self.models.contains_key(reference) {
            return Err(SweepError::ModelResolution {
                reference: reference.to_string(),
                reason: "already registered".to_string(),
            });
        }
        self.models.insert(reference.to_string(), Arc::new(model));
        tracing::debug!(reference = %reference, "model registered");
        Ok(())
    }

    pub fn resolve(&self, reference: &str) -> Result<Arc<dyn Model>> {
        parse_reference(reference)?;
        self.models
            .get(reference)
            .cloned()
            .ok_or_else(|| SweepError::ModelResolution {
                reference: reference.to_string(),
                reason: "no model registered under this reference".to_string(),
            })
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.models.contains_key(reference)
    }

    /// Registered references and their signatures, sorted by reference.
    pub fn list(&self) -> impl Iterator<Item = (&str, &ModelSignature)> {
        self.models
            .iter()
            .map(|(name, model)| (name.as_str(), model.signature()))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}
