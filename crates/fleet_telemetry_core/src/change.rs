//! Decoding of DynamoDB Streams batches.
//!
//! The batch envelope is validated up front; individual records are decoded
//! one at a time so a malformed record can be reported without discarding
//! its siblings.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::HandlerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Modify,
    Remove,
    Other(String),
}

impl ChangeKind {
    pub fn from_event_name(name: &str) -> Self {
        match name {
            "INSERT" => Self::Insert,
            "MODIFY" => Self::Modify,
            "REMOVE" => Self::Remove,
            other => Self::Other(other.to_string()),
        }
    }

    /// Inserts and modifications carry a new image worth evaluating.
    pub fn writes_new_image(&self) -> bool {
        matches!(self, Self::Insert | Self::Modify)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Insert => "INSERT",
            Self::Modify => "MODIFY",
            Self::Remove => "REMOVE",
            Self::Other(name) => name,
        }
    }
}

/// A row image in DynamoDB attribute-value JSON (`{"speed": {"S": "120"}}`).
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(transparent)]
pub struct AttributeImage(Map<String, Value>);

impl AttributeImage {
    /// String (`S`) attribute value.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.typed(name, "S")
    }

    /// String (`S`) or number (`N`) attribute value, as delivered text.
    pub fn scalar_text(&self, name: &str) -> Option<&str> {
        self.string(name).or_else(|| self.typed(name, "N"))
    }

    fn typed(&self, name: &str, type_tag: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|attribute| attribute.get(type_tag))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub event_id: Option<String>,
    pub kind: ChangeKind,
    pub old_image: Option<AttributeImage>,
    pub new_image: Option<AttributeImage>,
}

#[derive(Deserialize)]
struct RawStreamRecord {
    #[serde(rename = "eventID")]
    event_id: Option<String>,
    #[serde(rename = "eventName")]
    event_name: String,
    #[serde(default)]
    dynamodb: Option<RawStreamData>,
}

#[derive(Deserialize)]
struct RawStreamData {
    #[serde(rename = "OldImage")]
    old_image: Option<AttributeImage>,
    #[serde(rename = "NewImage")]
    new_image: Option<AttributeImage>,
}

impl ChangeEvent {
    pub fn from_record(record: &Value) -> Result<Self, String> {
        let raw: RawStreamRecord = serde_json::from_value(record.clone())
            .map_err(|error| format!("Malformed stream record: {error}"))?;
        let (old_image, new_image) = raw
            .dynamodb
            .map(|data| (data.old_image, data.new_image))
            .unwrap_or_default();

        Ok(Self {
            event_id: raw.event_id,
            kind: ChangeKind::from_event_name(&raw.event_name),
            old_image,
            new_image,
        })
    }
}

/// Returns the raw records of a stream batch.
pub fn batch_records(event: &Value) -> Result<&[Value], HandlerError> {
    event
        .get("Records")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| HandlerError::internal("Stream event must include a Records array"))
}
