//! Tag discrimination over JSON trees.
//!
//! A JSON object is an encoded [`TypedArray`] if it carries [`NDARRAY_TAG`],
//! an encoded [`Dataset`] if it carries [`DATAFRAME_TAG`], and is passed
//! through untouched otherwise. [`Tagged::classify`] is the only place that
//! makes this decision.

use serde_json::{Map, Value};

use crate::array::{TypedArray, NDARRAY_TAG};
use crate::dataset::{Dataset, DATAFRAME_TAG};
use crate::error::{CodecError, Result};

/// A decoded JSON node.
#[derive(Debug, Clone, PartialEq)]
pub enum Tagged {
    Array(TypedArray),
    Dataset(Dataset),
    Other(Value),
}

/// Which marker, if any, an object carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Array,
    Dataset,
}

impl Tag {
    /// Inspect an object for a marker key.
    ///
    /// # Errors
    ///
    /// `CodecError::MalformedArray` if both markers are present.
    pub fn of(obj: &Map<String, Value>) -> Result<Option<Self>> {
        match (obj.contains_key(NDARRAY_TAG), obj.contains_key(DATAFRAME_TAG)) {
            (true, true) => Err(CodecError::MalformedArray(format!(
                "object carries both {NDARRAY_TAG} and {DATAFRAME_TAG}"
            ))),
            (true, false) => Ok(Some(Self::Array)),
            (false, true) => Ok(Some(Self::Dataset)),
            (false, false) => Ok(None),
        }
    }
}

impl Tagged {
    /// Decode a single JSON value without descending into children.
    pub fn classify(value: Value) -> Result<Self> {
        let Value::Object(obj) = value else {
            return Ok(Self::Other(value));
        };
        match Tag::of(&obj)? {
            Some(Tag::Array) => Ok(Self::Array(TypedArray::decode(&obj)?)),
            Some(Tag::Dataset) => Ok(Self::Dataset(Dataset::decode(&obj)?)),
            None => Ok(Self::Other(Value::Object(obj))),
        }
    }

    pub fn encode(&self) -> Value {
        match self {
            Self::Array(arr) => arr.encode(),
            Self::Dataset(ds) => ds.encode(),
            Self::Other(value) => value.clone(),
        }
    }

    pub fn as_array(&self) -> Option<&TypedArray> {
        match self {
            Self::Array(arr) => Some(arr),
            _ => None,
        }
    }

}

impl From<TypedArray> for Tagged {
    fn from(arr: TypedArray) -> Self {
        Self::Array(arr)
    }
}

impl From<Dataset> for Tagged {
    fn from(ds: Dataset) -> Self {
        Self::Dataset(ds)
    }
}

/// A JSON tree whose tagged objects have been decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(Tagged),
    List(Vec<Node>),
    Map(Vec<(String, Node)>),
}

impl Node {
    /// Look up a key when this node is a map.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_tagged(&self) -> Option<&Tagged> {
        match self {
            Self::Leaf(tagged) => Some(tagged),
            _ => None,
        }
    }
}

/// Decode every tagged object in `value`, children before parents.
///
/// Tagged objects are decoded as a whole; their own fields are not visited.
pub fn decode_tree(value: Value) -> Result<Node> {
    match value {
        Value::Array(items) => Ok(Node::List(
            items.into_iter().map(decode_tree).collect::<Result<_>>()?,
        )),
        Value::Object(obj) => {
            if Tag::of(&obj)?.is_some() {
                return Ok(Node::Leaf(Tagged::classify(Value::Object(obj))?));
            }
            Ok(Node::Map(
                obj.into_iter()
                    .map(|(k, v)| Ok((k, decode_tree(v)?)))
                    .collect::<Result<_>>()?,
            ))
        }
        scalar => Ok(Node::Leaf(Tagged::Other(scalar))),
    }
}

/// Inverse of [`decode_tree`].
pub fn encode_tree(node: &Node) -> Value {
    match node {
        Node::Leaf(tagged) => tagged.encode(),
        Node::List(items) => Value::Array(items.iter().map(encode_tree).collect()),
        Node::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), encode_tree(v)))
                .collect(),
        ),
    }
}
