use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HandlerError;

pub const VAN_ID: &str = "vanID";
pub const CLIENT_ID: &str = "clientID";
pub const SPEED: &str = "speed";
pub const LAT: &str = "lat";
pub const LON: &str = "lon";
pub const VAN_TIMESTAMP: &str = "vanTimestamp";
pub const DISCORD_WEBHOOK: &str = "discordWebhook";

/// One telemetry row, keyed by `vanID`.
///
/// The row is kept as a JSON object so attributes outside the known set
/// survive a create/read round trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TelemetryRecord(Map<String, Value>);

impl TelemetryRecord {
    /// Validates a create body. Only `vanID` is checked; everything else is
    /// persisted verbatim.
    pub fn from_body(body: Value) -> Result<Self, HandlerError> {
        let object = require_object(body)?;
        if non_empty_str(&object, VAN_ID).is_none() {
            return Err(HandlerError::validation("Missing vanID"));
        }
        Ok(Self(object))
    }

    /// Wraps a row read back from storage without validation.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn van_id(&self) -> Option<&str> {
        non_empty_str(&self.0, VAN_ID)
    }

    pub fn client_id(&self) -> Option<&str> {
        non_empty_str(&self.0, CLIENT_ID)
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Applies every assignment of `update` and stamps its `clientID`.
    pub fn apply(&mut self, update: &TelemetryUpdate) {
        self.0
            .insert(VAN_ID.to_string(), Value::String(update.van_id.clone()));
        self.0
            .insert(CLIENT_ID.to_string(), Value::String(update.client_id.clone()));
        for (field, value) in update.assignments() {
            self.0
                .insert(field.attribute_name().to_string(), value.clone());
        }
    }
}

/// Telemetry attributes a PATCH may assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatableField {
    Speed,
    Lat,
    Lon,
    VanTimestamp,
}

impl UpdatableField {
    pub const ALL: [UpdatableField; 4] = [Self::Speed, Self::Lat, Self::Lon, Self::VanTimestamp];

    pub fn attribute_name(self) -> &'static str {
        match self {
            Self::Speed => SPEED,
            Self::Lat => LAT,
            Self::Lon => LON,
            Self::VanTimestamp => VAN_TIMESTAMP,
        }
    }
}

/// Validated PATCH body: the row key, the owning client and the attributes
/// to assign.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryUpdate {
    pub van_id: String,
    pub client_id: String,
    assignments: Vec<(UpdatableField, Value)>,
}

impl TelemetryUpdate {
    /// A field is assigned when its key is present in the body, `null`
    /// included. Value types are not checked.
    pub fn from_body(body: Value) -> Result<Self, HandlerError> {
        let mut object = require_object(body)?;

        let (Some(van_id), Some(client_id)) = (
            non_empty_str(&object, VAN_ID).map(str::to_string),
            non_empty_str(&object, CLIENT_ID).map(str::to_string),
        ) else {
            return Err(HandlerError::validation(
                "Missing vanID or clientID in request",
            ));
        };

        let assignments: Vec<(UpdatableField, Value)> = UpdatableField::ALL
            .into_iter()
            .filter_map(|field| {
                object
                    .remove(field.attribute_name())
                    .map(|value| (field, value))
            })
            .collect();

        if assignments.is_empty() {
            return Err(HandlerError::validation("No fields to update"));
        }

        Ok(Self {
            van_id,
            client_id,
            assignments,
        })
    }

    pub fn assignments(&self) -> &[(UpdatableField, Value)] {
        &self.assignments
    }
}

/// Row of the client table. Owned by an external process; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(
        rename = "discordWebhook",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub discord_webhook: Option<String>,
}

impl ClientRecord {
    /// The configured webhook, if it is a non-blank string.
    pub fn webhook(&self) -> Option<&str> {
        self.discord_webhook
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

fn require_object(body: Value) -> Result<Map<String, Value>, HandlerError> {
    match body {
        Value::Object(object) => Ok(object),
        _ => Err(HandlerError::validation(
            "Request body must be a JSON object",
        )),
    }
}

fn non_empty_str<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}
