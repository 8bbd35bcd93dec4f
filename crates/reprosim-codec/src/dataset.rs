//! Tabular record sets.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{CodecError, Result};
use crate::scalar::Scalar;

/// Marker key identifying an encoded [`Dataset`].
pub const DATAFRAME_TAG: &str = "__dataframe__";

/// The only orientation written and accepted under [`DATAFRAME_TAG`].
pub const RECORDS_ORIENT: &str = "records";

/// One table row: column name to scalar value, in insertion order.
pub type Record = IndexMap<String, Scalar>;

/// An ordered sequence of records.
///
/// Records are expected to share one column set but this is not enforced;
/// consumers treat an absent column as a missing value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Encode as `{"__dataframe__": "records", "data": [ {..}, .. ]}`.
    pub fn encode(&self) -> Value {
        let data = self
            .records
            .iter()
            .map(|record| {
                Value::Object(
                    record
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect::<Map<String, Value>>(),
                )
            })
            .collect();

        let mut obj = Map::new();
        obj.insert(
            DATAFRAME_TAG.to_string(),
            Value::String(RECORDS_ORIENT.to_string()),
        );
        obj.insert("data".to_string(), Value::Array(data));
        Value::Object(obj)
    }

    /// Decode an object previously produced by [`Dataset::encode`].
    pub fn decode(obj: &Map<String, Value>) -> Result<Self> {
        match obj.get(DATAFRAME_TAG).and_then(Value::as_str) {
            Some(RECORDS_ORIENT) => {}
            Some(other) => {
                return Err(CodecError::MalformedDataset(format!(
                    "unsupported orientation {other:?}"
                )))
            }
            None => {
                return Err(CodecError::MalformedDataset(format!(
                    "{DATAFRAME_TAG} must be a string"
                )))
            }
        }

        let rows = obj
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| CodecError::MalformedDataset("data must be an array".to_string()))?;

        let records = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let fields = row.as_object().ok_or_else(|| {
                    CodecError::MalformedDataset(format!("record {i} is not a mapping"))
                })?;
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Scalar::from_json(v)?)))
                    .collect::<Result<Record>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { records })
    }
}

impl From<Vec<Record>> for Dataset {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.encode().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Dataset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| serde::de::Error::custom("encoded dataset must be a JSON object"))?;
        Self::decode(obj).map_err(serde::de::Error::custom)
    }
}
