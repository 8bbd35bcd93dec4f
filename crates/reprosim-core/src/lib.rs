//! reprosim core library
//!
//! Runs a stochastic model over the full-factorial grid of its parameter
//! spans, averages replicates per grid point, and archives configuration and
//! results in a record that can be re-run and checked draw for draw.

pub mod aggregate;
pub mod digest;
pub mod error;
pub mod grid;
pub mod metrics;
pub mod model;
pub mod obs;
pub mod prng;
pub mod progress;
pub mod record;
pub mod reproduce;
pub mod runner;
pub mod telemetry;
pub mod validation;

pub use aggregate::{aggregate, Aggregator};
pub use error::{ModelError, RecordError, Result, SweepError, ValidationError};
pub use grid::{Bindings, Grid, GridPoint, Spans};
pub use model::{FnModel, Model, ModelRegistry, ModelSignature, ParamSpec};
pub use prng::{prepare_stream, PrngState, SimRng, StreamOrigin};
pub use progress::{CancelToken, LogProgress, NoProgress, Progress};
pub use record::{DecodePolicy, SimRecord, SweepOutcome, DEFAULT_REPLICATES};
pub use reproduce::{check_reproduction, reproduce, Mismatch, ReproductionReport};
pub use runner::{ReplicateRecord, SimulationRunner};
pub use validation::SweepPlan;

pub use reprosim_codec::{Dataset, Record, Scalar};
