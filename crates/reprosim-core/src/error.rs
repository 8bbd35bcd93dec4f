//! Error taxonomy for sweep configuration, model calls and record I/O.

use reprosim_codec::CodecError;

/// Errors found while checking a sweep before any draw is made.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("replicate count must not be negative, got {0}")]
    NegativeReplicates(i64),

    #[error("at least one output name is required")]
    NoOutputs,

    #[error("output name {0:?} is listed more than once")]
    DuplicateOutput(String),

    #[error("output name {0:?} collides with a model parameter")]
    OutputShadowsParameter(String),

    #[error("span {name:?} is not a parameter of model {model}")]
    UnknownParameter { model: String, name: String },

    #[error("model {model} requires parameter {name:?} but no span or default supplies it")]
    MissingParameter { model: String, name: String },

    #[error("parameter {name:?} is numeric but span candidate {value} is not")]
    NonNumericCandidate { name: String, value: String },

    #[error("span name must not be empty")]
    EmptySpanName,
}

/// Errors raised by a model while computing one replicate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("invalid argument {name:?}: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("missing argument {0:?}")]
    MissingArgument(String),

    #[error("model failed: {0}")]
    Failed(String),
}

/// Errors that abort a sweep.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("cannot resolve model {reference:?}: {reason}")]
    ModelResolution { reference: String, reason: String },

    #[error("model returned {actual} outputs but {expected} were declared")]
    OutputArityMismatch { expected: usize, actual: usize },

    #[error("model error at grid point {grid_point}, replicate {replicate}: {source}")]
    Model {
        grid_point: usize,
        replicate: usize,
        #[source]
        source: ModelError,
    },

    #[error("sweep cancelled after {completed} of {total} grid points")]
    Cancelled { completed: usize, total: usize },
}

/// Errors from loading or persisting a simulation record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("codec error in field {field:?}: {source}")]
    Codec {
        field: &'static str,
        #[source]
        source: CodecError,
    },

    #[error("missing required field {0:?}")]
    MissingField(&'static str),

    #[error("record must be a JSON object")]
    NotAnObject,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sweep error: {0}")]
    Sweep(#[from] SweepError),
}

/// Result type for sweep operations.
pub type Result<T> = std::result::Result<T, SweepError>;
