//! Self-describing JSON codec for simulation records (Layer 0).
//!
//! Two value kinds travel inside ordinary JSON documents:
//!
//! - [`TypedArray`]: `{"__ndarray__": <base64>, "dtype": <name>, "shape": [..]}`
//! - [`Dataset`]: `{"__dataframe__": "records", "data": [ {..}, .. ]}`
//!
//! Everything else passes through unchanged. Both kinds implement serde's
//! `Serialize`/`Deserialize` through the codec, so they can be embedded in
//! derived structs directly.

pub mod array;
pub mod dataset;
pub mod error;
pub mod scalar;
pub mod tagged;

pub use array::{DType, TypedArray, NDARRAY_TAG};
pub use dataset::{Dataset, Record, DATAFRAME_TAG, RECORDS_ORIENT};
pub use error::{CodecError, Result};
pub use scalar::{Scalar, ScalarKey};
pub use tagged::{decode_tree, encode_tree, Node, Tag, Tagged};
