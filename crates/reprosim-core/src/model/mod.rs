//! Model interface: named scalar parameters in, fixed-arity numeric tuple out.
//!
//! A model never reaches for ambient randomness. Every draw comes from the
//! [`SimRng`] handed to [`Model::call`], which keeps a sweep's draw order
//! fully determined by its seed or captured state.

pub mod registry;
pub mod urn;

use reprosim_codec::Scalar;

use crate::error::ModelError;
use crate::grid::Bindings;
use crate::prng::SimRng;

pub use registry::{parse_reference, ModelRegistry};

/// One declared model parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    /// Value used when no span supplies the parameter. `None` means required.
    pub default: Option<Scalar>,
    /// Whether candidates must be numeric.
    pub numeric: bool,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            numeric: true,
        }
    }

    pub fn optional(name: impl Into<String>, default: impl Into<Scalar>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
            numeric: true,
        }
    }

    /// Accept any scalar, not only numbers.
    pub fn any_scalar(mut self) -> Self {
        self.numeric = false;
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Declared call shape of a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSignature {
    pub params: Vec<ParamSpec>,
    /// Whether the model draws from the PRNG handle.
    pub uses_rng: bool,
}

impl ModelSignature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn with_rng(mut self) -> Self {
        self.uses_rng = true;
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Span bindings completed with declared defaults, in declaration order
    /// followed by any bindings the signature does not name.
    pub fn bind(&self, point: &Bindings) -> Result<Bindings, ModelError> {
        let mut args = Bindings::with_capacity(self.params.len().max(point.len()));
        for spec in &self.params {
            match point.get(&spec.name).or(spec.default.as_ref()) {
                Some(value) => {
                    args.insert(spec.name.clone(), value.clone());
                }
                None => return Err(ModelError::MissingArgument(spec.name.clone())),
            }
        }
        for (name, value) in point {
            if !args.contains_key(name) {
                args.insert(name.clone(), value.clone());
            }
        }
        Ok(args)
    }
}

impl std::fmt::Display for ModelSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<String> = self
            .params
            .iter()
            .map(|p| match &p.default {
                Some(d) => format!("{}={}", p.name, d),
                None => p.name.clone(),
            })
            .collect();
        if self.uses_rng {
            parts.push("rng".to_string());
        }
        write!(f, "({})", parts.join(", "))
    }
}

/// A stochastic model callable by the sweep runner.
pub trait Model: Send + Sync {
    fn signature(&self) -> &ModelSignature;

    /// Compute one replicate. `args` holds every declared parameter.
    fn call(&self, args: &Bindings, rng: &mut SimRng) -> Result<Vec<f64>, ModelError>;
}

/// Adapter turning a closure into a [`Model`].
pub struct FnModel<F> {
    signature: ModelSignature,
    func: F,
}

impl<F> FnModel<F>
where
    F: Fn(&Bindings, &mut SimRng) -> Result<Vec<f64>, ModelError> + Send + Sync,
{
    pub fn new(signature: ModelSignature, func: F) -> Self {
        Self { signature, func }
    }
}

impl<F> Model for FnModel<F>
where
    F: Fn(&Bindings, &mut SimRng) -> Result<Vec<f64>, ModelError> + Send + Sync,
{
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn call(&self, args: &Bindings, rng: &mut SimRng) -> Result<Vec<f64>, ModelError> {
        (self.func)(args, rng)
    }
}

/// Fetch a numeric argument as `f64`.
pub fn arg_f64(args: &Bindings, name: &str) -> Result<f64, ModelError> {
    let value = args
        .get(name)
        .ok_or_else(|| ModelError::MissingArgument(name.to_string()))?;
    value.as_f64().ok_or_else(|| ModelError::InvalidArgument {
        name: name.to_string(),
        reason: format!("expected a number, got {value}"),
    })
}

/// Fetch an integral argument. Floats with no fractional part are accepted.
pub fn arg_i64(args: &Bindings, name: &str) -> Result<i64, ModelError> {
    let value = args
        .get(name)
        .ok_or_else(|| ModelError::MissingArgument(name.to_string()))?;
    value.as_i64().ok_or_else(|| ModelError::InvalidArgument {
        name: name.to_string(),
        reason: format!("expected an integer, got {value}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn sig() -> ModelSignature {
        ModelSignature::new()
            .param(ParamSpec::required("x"))
            .param(ParamSpec::optional("k", 3_i64))
            .with_rng()
    }

    #[test]
    fn test_bind_fills_defaults() {
        let mut point = Bindings::new();
        point.insert("x".to_string(), Scalar::Float(0.5));
        let args = sig().bind(&point).unwrap();
        assert_eq!(args["x"], Scalar::Float(0.5));
        assert_eq!(args["k"], Scalar::Int(3));
    }

    #[test]
    fn test_bind_span_overrides_default() {
        let mut point = Bindings::new();
        point.insert("k".to_string(), Scalar::Int(9));
        point.insert("x".to_string(), Scalar::Int(1));
        let args = sig().bind(&point).unwrap();
        assert_eq!(args["k"], Scalar::Int(9));
        let order: Vec<&str> = args.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["x", "k"]);
    }

    #[test]
    fn test_bind_missing_required() {
        let err = sig().bind(&Bindings::new()).unwrap_err();
        assert_eq!(err, ModelError::MissingArgument("x".to_string()));
    }

    #[test]
    fn test_signature_display() {
        assert_eq!(sig().to_string(), "(x, k=3, rng)");
    }

    #[test]
    fn test_fn_model_calls_closure() {
        let model = FnModel::new(sig(), |args: &Bindings, rng: &mut SimRng| {
            let x = arg_f64(args, "x")?;
            let k = arg_i64(args, "k")?;
            let u: f64 = rng.gen();
            Ok(vec![x * k as f64, u])
        });
        let mut args = Bindings::new();
        args.insert("x".to_string(), Scalar::Float(2.0));
        args.insert("k".to_string(), Scalar::Int(3));
        let mut rng = SimRng::seed_from_u64(1);
        let out = model.call(&args, &mut rng).unwrap();
        assert_eq!(out[0], 6.0);
        assert!((0.0..1.0).contains(&out[1]));
    }

    #[test]
    fn test_arg_helpers_reject_wrong_kinds() {
        let mut args = Bindings::new();
        args.insert("s".to_string(), Scalar::Str("abc".to_string()));
        args.insert("f".to_string(), Scalar::Float(1.5));
        assert!(matches!(
            arg_f64(&args, "s"),
            Err(ModelError::InvalidArgument { .. })
        ));
        assert!(matches!(
            arg_i64(&args, "f"),
            Err(ModelError::InvalidArgument { .. })
        ));
        assert_eq!(
            arg_f64(&args, "nope"),
            Err(ModelError::MissingArgument("nope".to_string()))
        );
    }
}
