//! Pólya-urn quality/efficiency model, registered as `urn:draw`.
//!
//! `n` items have fixed qualities `q_i = (i + 1) / n` and popularity counts
//! starting at one. On each step one uniform draw decides whether the next
//! pick follows quality (probability `beta`) or popularity `c^alpha`. The
//! outputs are the count-weighted mean quality and Kendall's tau-b between
//! quality and the final counts.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::{arg_f64, arg_i64, Model, ModelSignature, ParamSpec};
use crate::error::ModelError;
use crate::grid::Bindings;
use crate::prng::SimRng;

pub const REFERENCE: &str = "urn:draw";

pub struct UrnDraw {
    signature: ModelSignature,
}

impl UrnDraw {
    pub fn new() -> Self {
        Self {
            signature: ModelSignature::new()
                .param(ParamSpec::required("steps"))
                .param(ParamSpec::optional("n", 10_i64))
                .param(ParamSpec::optional("alpha", 1_i64))
                .param(ParamSpec::optional("beta", 0.5))
                .with_rng(),
        }
    }
}

impl Default for UrnDraw {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for UrnDraw {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn call(&self, args: &Bindings, rng: &mut SimRng) -> Result<Vec<f64>, ModelError> {
        let steps = arg_i64(args, "steps")?;
        let n = arg_i64(args, "n")?;
        let alpha = arg_f64(args, "alpha")?;
        let beta = arg_f64(args, "beta")?;

        if steps <= 0 {
            return Err(invalid("steps", "at least one step required"));
        }
        if n <= 0 {
            return Err(invalid("n", "at least one item required"));
        }
        if alpha.is_nan() || alpha < 0.0 {
            return Err(invalid("alpha", "must be non-negative"));
        }
        if !(0.0..=1.0).contains(&beta) {
            return Err(invalid("beta", "must be a probability"));
        }

        let (quality, efficiency) = draw(steps as u64, n as usize, alpha, beta, rng)?;
        Ok(vec![quality, efficiency])
    }
}

fn invalid(name: &str, reason: &str) -> ModelError {
    ModelError::InvalidArgument {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn draw(
    steps: u64,
    n: usize,
    alpha: f64,
    beta: f64,
    rng: &mut SimRng,
) -> Result<(f64, f64), ModelError> {
    let q: Vec<f64> = (0..n).map(|i| (i + 1) as f64 / n as f64).collect();
    let by_quality =
        WeightedIndex::new(&q).map_err(|e| ModelError::Failed(format!("quality weights: {e}")))?;
    let mut counts = vec![1.0_f64; n];

    for _ in 0..steps {
        let u: f64 = rng.gen();
        let k = if u < beta {
            by_quality.sample(rng)
        } else {
            let weights = counts.iter().map(|c| c.powf(alpha));
            WeightedIndex::new(weights)
                .map_err(|e| ModelError::Failed(format!("popularity weights: {e}")))?
                .sample(rng)
        };
        counts[k] += 1.0;
    }

    let total: f64 = counts.iter().sum();
    let quality = q.iter().zip(&counts).map(|(q, c)| q * c).sum::<f64>() / total;
    Ok((quality, kendall_tau_b(&q, &counts)))
}

/// Kendall's tau-b rank correlation. NaN when either side is constant.
pub fn kendall_tau_b(x: &[f64], y: &[f64]) -> f64 {
    let len = x.len().min(y.len());
    let mut net = 0i64;
    let mut pairs = 0i64;
    let mut tied_x = 0i64;
    let mut tied_y = 0i64;

    for i in 0..len {
        for j in (i + 1)..len {
            pairs += 1;
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];
            if dx == 0.0 {
                tied_x += 1;
            }
            if dy == 0.0 {
                tied_y += 1;
            }
            if dx != 0.0 && dy != 0.0 {
                net += if (dx > 0.0) == (dy > 0.0) { 1 } else { -1 };
            }
        }
    }

    let denom = (((pairs - tied_x) * (pairs - tied_y)) as f64).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    net as f64 / denom
}
