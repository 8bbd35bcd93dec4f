//! Typed numeric arrays with an explicit element type and shape.
//!
//! The buffer is kept as raw little-endian bytes in row-major order, so an
//! encode/decode cycle reproduces it bit for bit regardless of element type.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{CodecError, Result};

/// Marker key identifying an encoded [`TypedArray`].
pub const NDARRAY_TAG: &str = "__ndarray__";

/// Supported element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl DType {
    pub const ALL: [DType; 11] = [
        DType::Bool,
        DType::Int8,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::UInt8,
        DType::UInt16,
        DType::UInt32,
        DType::UInt64,
        DType::Float32,
        DType::Float64,
    ];

    /// Width of one element in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Wire name of the element type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.name() == s)
            .ok_or_else(|| CodecError::UnknownElementType(s.to_string()))
    }
}

/// A shaped buffer of numeric elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedArray {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl TypedArray {
    /// Build an array from raw little-endian bytes.
    ///
    /// # Errors
    ///
    /// `CodecError::MalformedArray` when the byte length does not equal the
    /// element count implied by `shape` times the element width.
    pub fn new(dtype: DType, shape: Vec<usize>, data: Vec<u8>) -> Result<Self> {
        let count = element_count(&shape)?;
        let expected = count.checked_mul(dtype.width()).ok_or_else(|| {
            CodecError::MalformedArray(format!("shape {shape:?} overflows the address space"))
        })?;
        if expected != data.len() {
            return Err(CodecError::MalformedArray(format!(
                "shape {shape:?} of {dtype} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    pub fn from_f64(shape: Vec<usize>, values: &[f64]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DType::Float64, shape, data)
    }

    pub fn from_i64(shape: Vec<usize>, values: &[i64]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DType::Int64, shape, data)
    }

    pub fn from_u64(shape: Vec<usize>, values: &[u64]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DType::UInt64, shape, data)
    }

    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Result<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DType::Float32, shape, data)
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Raw row-major little-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len() / self.dtype.width()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        self.expect_dtype(DType::Float64)?;
        Ok(self
            .data
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(le8(c)))
            .collect())
    }

    pub fn to_i64_vec(&self) -> Result<Vec<i64>> {
        self.expect_dtype(DType::Int64)?;
        Ok(self
            .data
            .chunks_exact(8)
            .map(|c| i64::from_le_bytes(le8(c)))
            .collect())
    }

    pub fn to_u64_vec(&self) -> Result<Vec<u64>> {
        self.expect_dtype(DType::UInt64)?;
        Ok(self
            .data
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(le8(c)))
            .collect())
    }

    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        self.expect_dtype(DType::Float32)?;
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn expect_dtype(&self, expected: DType) -> Result<()> {
        if self.dtype != expected {
            return Err(CodecError::DTypeMismatch {
                expected: expected.to_string(),
                actual: self.dtype.to_string(),
            });
        }
        Ok(())
    }

    /// Encode as `{"__ndarray__": <base64>, "dtype": <name>, "shape": [..]}`.
    pub fn encode(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(NDARRAY_TAG.to_string(), Value::String(STANDARD.encode(&self.data)));
        obj.insert("dtype".to_string(), Value::String(self.dtype.name().to_string()));
        obj.insert(
            "shape".to_string(),
            Value::Array(self.shape.iter().map(|d| Value::from(*d as u64)).collect()),
        );
        Value::Object(obj)
    }

    /// Decode an object previously produced by [`TypedArray::encode`].
    pub fn decode(obj: &Map<String, Value>) -> Result<Self> {
        let payload = obj
            .get(NDARRAY_TAG)
            .and_then(Value::as_str)
            .ok_or_else(|| CodecError::MalformedArray(format!("{NDARRAY_TAG} must be a string")))?;
        let dtype: DType = obj
            .get("dtype")
            .and_then(Value::as_str)
            .ok_or_else(|| CodecError::MalformedArray("dtype must be a string".to_string()))?
            .parse()?;
        let shape = obj
            .get("shape")
            .and_then(Value::as_array)
            .ok_or_else(|| CodecError::MalformedArray("shape must be an array".to_string()))?
            .iter()
            .map(|d| {
                d.as_u64()
                    .and_then(|d| usize::try_from(d).ok())
                    .ok_or_else(|| {
                        CodecError::MalformedArray(format!(
                            "shape entries must be non-negative integers, found {d}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let data = STANDARD
            .decode(payload)
            .map_err(|e| CodecError::MalformedArray(format!("invalid base64 payload: {e}")))?;
        Self::new(dtype, shape, data)
    }
}

impl Serialize for TypedArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.encode().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TypedArray {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| serde::de::Error::custom("encoded array must be a JSON object"))?;
        Self::decode(obj).map_err(serde::de::Error::custom)
    }
}

fn element_count(shape: &[usize]) -> Result<usize> {
    shape.iter().try_fold(1usize, |acc, d| {
        acc.checked_mul(*d).ok_or_else(|| {
            CodecError::MalformedArray(format!("shape {shape:?} overflows the address space"))
        })
    })
}

fn le8(chunk: &[u8]) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(chunk);
    bytes
}
