//! DynamoDB-backed storage adapters.
//!
//! Rows are converted between DynamoDB attribute values and JSON so records
//! keep whatever attributes the client sent.

use std::collections::HashMap;

use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use fleet_telemetry_core::error::StoreError;
use fleet_telemetry_core::page::{Page, PageRequest};
use fleet_telemetry_core::record::{
    ClientRecord, TelemetryRecord, TelemetryUpdate, CLIENT_ID, DISCORD_WEBHOOK, VAN_ID,
};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::adapters::block_on;
use crate::adapters::client_directory::ClientDirectory;
use crate::adapters::telemetry_store::TelemetryStore;

pub type Item = HashMap<String, AttributeValue>;

const OWNERSHIP_CONDITION: &str = "attribute_not_exists(#clientID) OR #clientID = :clientID";

#[derive(Debug, Clone)]
pub struct DynamoTelemetryStore {
    client: Client,
    table: String,
}

impl DynamoTelemetryStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

impl TelemetryStore for DynamoTelemetryStore {
    fn put_record(&self, record: &TelemetryRecord) -> Result<(), StoreError> {
        block_on(
            self.client
                .put_item()
                .table_name(&self.table)
                .set_item(Some(map_to_item(record.as_map())))
                .send(),
        )
        .map(|_| ())
        .map_err(|error| backend_error("failed to put telemetry record", error))
    }

    fn update_record(&self, update: &TelemetryUpdate) -> Result<TelemetryRecord, StoreError> {
        let expression = UpdateExpression::from_update(update);
        debug!(
            van_id = %update.van_id,
            update_expression = %expression.text,
            "updating telemetry record"
        );

        let result = block_on(
            self.client
                .update_item()
                .table_name(&self.table)
                .key(VAN_ID, AttributeValue::S(update.van_id.clone()))
                .update_expression(expression.text)
                .condition_expression(OWNERSHIP_CONDITION)
                .set_expression_attribute_names(Some(expression.names))
                .set_expression_attribute_values(Some(expression.values))
                .return_values(ReturnValue::AllNew)
                .send(),
        );

        match result {
            Ok(output) => Ok(TelemetryRecord::from_map(
                output.attributes().map(item_to_map).unwrap_or_default(),
            )),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_conditional_check_failed_exception()) =>
            {
                Err(StoreError::ClientMismatch {
                    van_id: update.van_id.clone(),
                })
            }
            Err(error) => Err(backend_error("failed to update telemetry record", error)),
        }
    }

    fn get_record(&self, van_id: &str) -> Result<Option<TelemetryRecord>, StoreError> {
        let output = block_on(
            self.client
                .get_item()
                .table_name(&self.table)
                .key(VAN_ID, AttributeValue::S(van_id.to_string()))
                .send(),
        )
        .map_err(|error| backend_error("failed to get telemetry record", error))?;

        Ok(output
            .item()
            .map(|item| TelemetryRecord::from_map(item_to_map(item))))
    }

    fn scan_page(&self, request: &PageRequest) -> Result<Page<TelemetryRecord>, StoreError> {
        let start_key = request
            .cursor
            .as_ref()
            .map(|cursor| Item::from([(VAN_ID.to_string(), AttributeValue::S(cursor.clone()))]));

        let output = block_on(
            self.client
                .scan()
                .table_name(&self.table)
                .limit(i32::try_from(request.limit).unwrap_or(i32::MAX))
                .set_exclusive_start_key(start_key)
                .send(),
        )
        .map_err(|error| backend_error("failed to scan telemetry table", error))?;

        let items = output
            .items()
            .iter()
            .map(|item| TelemetryRecord::from_map(item_to_map(item)))
            .collect();
        let next_cursor = output
            .last_evaluated_key()
            .and_then(|key| key.get(VAN_ID))
            .and_then(|value| value.as_s().ok())
            .cloned();

        Ok(Page { items, next_cursor })
    }
}

#[derive(Debug, Clone)]
pub struct DynamoClientDirectory {
    client: Client,
    table: String,
}

impl DynamoClientDirectory {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

impl ClientDirectory for DynamoClientDirectory {
    fn get_client(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError> {
        let output = block_on(
            self.client
                .get_item()
                .table_name(&self.table)
                .key(CLIENT_ID, AttributeValue::S(client_id.to_string()))
                .send(),
        )
        .map_err(|error| backend_error("failed to get client record", error))?;

        Ok(output.item().map(|item| ClientRecord {
            client_id: client_id.to_string(),
            discord_webhook: item
                .get(DISCORD_WEBHOOK)
                .and_then(|value| value.as_s().ok())
                .cloned(),
        }))
    }
}

/// `SET` expression for a PATCH. The owning `clientID` is always written so
/// the ownership condition holds for later updates.
struct UpdateExpression {
    text: String,
    names: HashMap<String, String>,
    values: Item,
}

impl UpdateExpression {
    fn from_update(update: &TelemetryUpdate) -> Self {
        let mut clauses = vec![format!("#{CLIENT_ID} = :{CLIENT_ID}")];
        let mut names = HashMap::from([(format!("#{CLIENT_ID}"), CLIENT_ID.to_string())]);
        let mut values = Item::from([(
            format!(":{CLIENT_ID}"),
            AttributeValue::S(update.client_id.clone()),
        )]);

        for (field, value) in update.assignments() {
            let name = field.attribute_name();
            clauses.push(format!("#{name} = :{name}"));
            names.insert(format!("#{name}"), name.to_string());
            values.insert(format!(":{name}"), json_to_attribute(value));
        }

        Self {
            text: format!("SET {}", clauses.join(", ")),
            names,
            values,
        }
    }
}

pub fn map_to_item(map: &Map<String, Value>) -> Item {
    map.iter()
        .map(|(name, value)| (name.clone(), json_to_attribute(value)))
        .collect()
}

pub fn item_to_map(item: &Item) -> Map<String, Value> {
    item.iter()
        .map(|(name, value)| (name.clone(), attribute_to_json(value)))
        .collect()
}

pub fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(*flag),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::String(text) => AttributeValue::S(text.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(json_to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(map_to_item(map)),
    }
}

/// Binary attributes have no JSON form and read back as `null`.
pub fn attribute_to_json(attribute: &AttributeValue) -> Value {
    match attribute {
        AttributeValue::S(text) => Value::String(text.clone()),
        AttributeValue::N(number) => number_to_json(number),
        AttributeValue::Bool(flag) => Value::Bool(*flag),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::Array(values.iter().map(attribute_to_json).collect()),
        AttributeValue::M(item) => Value::Object(item_to_map(item)),
        AttributeValue::Ss(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(values) => {
            Value::Array(values.iter().map(|number| number_to_json(number)).collect())
        }
        _ => Value::Null,
    }
}

fn number_to_json(number: &str) -> Value {
    number
        .parse::<Number>()
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(number.to_string()))
}

fn backend_error<E>(context: &str, error: E) -> StoreError
where
    E: std::error::Error,
{
    StoreError::Backend(format!("{context}: {}", DisplayErrorContext(&error)))
}
