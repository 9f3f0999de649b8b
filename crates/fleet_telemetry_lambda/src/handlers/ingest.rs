use fleet_telemetry_core::error::HandlerError;
use fleet_telemetry_core::page::{PageRequest, DEFAULT_MAX_PAGE_SIZE, DEFAULT_SCAN_PAGE_SIZE};
use fleet_telemetry_core::record::{TelemetryRecord, TelemetryUpdate, VAN_ID};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::adapters::telemetry_store::{ScanPages, TelemetryStore};
use crate::handlers::response::{
    error_response, json_response, raw_json_response, ApiGatewayResponse,
};

const LIMIT_PARAM: &str = "limit";
const CURSOR_PARAM: &str = "cursor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    /// Page size used when a full read walks the table.
    pub scan_page_size: usize,
    /// Largest `limit` a paged read may ask for.
    pub max_page_size: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

/// Handles one API Gateway proxy event against the telemetry table.
///
/// Every outcome, including storage failures and malformed bodies, is turned
/// into a response; nothing is propagated to the runtime.
pub fn handle_ingest_event(
    event: Value,
    store: &dyn TelemetryStore,
    settings: &IngestSettings,
) -> ApiGatewayResponse {
    debug!(event = %event, "ingest event received");

    let method = request_method(&event).unwrap_or("UNKNOWN").to_string();
    match dispatch(&method, &event, store, settings) {
        Ok(response) => response,
        Err(failure) => {
            if failure.status_code() >= 500 {
                error!(method = %method, error = %failure, "ingest request failed");
            } else {
                warn!(
                    method = %method,
                    status = failure.status_code(),
                    error = %failure,
                    "ingest request rejected"
                );
            }
            error_response(&failure)
        }
    }
}

fn dispatch(
    method: &str,
    event: &Value,
    store: &dyn TelemetryStore,
    settings: &IngestSettings,
) -> Result<ApiGatewayResponse, HandlerError> {
    match method {
        "POST" => create_record(request_body(event)?, store),
        "PATCH" => update_record(request_body(event)?, store),
        "GET" => fetch_records(event, store, settings),
        other => Err(HandlerError::MethodNotAllowed(other.to_string())),
    }
}

fn create_record(
    body: Value,
    store: &dyn TelemetryStore,
) -> Result<ApiGatewayResponse, HandlerError> {
    let record = TelemetryRecord::from_body(body)?;
    store.put_record(&record)?;
    info!(
        van_id = record.van_id().unwrap_or_default(),
        client_id = record.client_id().unwrap_or_default(),
        "telemetry record inserted"
    );

    Ok(json_response(
        200,
        json!({
            "message": "Data inserted successfully",
            "item": record,
        }),
    ))
}

fn update_record(
    body: Value,
    store: &dyn TelemetryStore,
) -> Result<ApiGatewayResponse, HandlerError> {
    let update = TelemetryUpdate::from_body(body)?;
    let updated = store.update_record(&update)?;
    info!(
        van_id = %update.van_id,
        client_id = %update.client_id,
        fields = update.assignments().len(),
        "telemetry record updated"
    );

    Ok(json_response(
        200,
        json!({
            "message": "Data updated successfully",
            "updatedItem": updated,
        }),
    ))
}

fn fetch_records(
    event: &Value,
    store: &dyn TelemetryStore,
    settings: &IngestSettings,
) -> Result<ApiGatewayResponse, HandlerError> {
    if let Some(van_id) = query_param(event, VAN_ID) {
        let record = store
            .get_record(van_id)?
            .ok_or_else(|| HandlerError::NotFound("Van not found".to_string()))?;
        return Ok(json_response(200, json!(record)));
    }

    let limit = query_param(event, LIMIT_PARAM);
    let cursor = query_param(event, CURSOR_PARAM);
    if limit.is_some() || cursor.is_some() {
        let default_limit = settings
            .scan_page_size
            .min(settings.max_page_size)
            .to_string();
        let request = PageRequest::from_query(
            limit.unwrap_or(&default_limit),
            cursor,
            settings.max_page_size,
        )?;
        let page = store.scan_page(&request)?;
        return Ok(json_response(200, json!(page)));
    }

    scan_all(store, settings.scan_page_size)
}

/// Serializes the table page by page so only one page of records is held
/// in memory alongside the response body.
fn scan_all(
    store: &dyn TelemetryStore,
    page_size: usize,
) -> Result<ApiGatewayResponse, HandlerError> {
    let mut body = String::from("[");
    let mut count = 0usize;

    for page in ScanPages::new(store, page_size) {
        for record in page?.items {
            if count > 0 {
                body.push(',');
            }
            let encoded = serde_json::to_string(&record)
                .map_err(|error| HandlerError::internal(error.to_string()))?;
            body.push_str(&encoded);
            count += 1;
        }
    }
    body.push(']');

    debug!(records = count, "telemetry table scanned");
    Ok(raw_json_response(200, body))
}

/// REST API events carry `httpMethod`; HTTP API (v2) events carry
/// `requestContext.http.method`.
fn request_method(event: &Value) -> Option<&str> {
    event
        .get("httpMethod")
        .and_then(Value::as_str)
        .or_else(|| {
            event
                .pointer("/requestContext/http/method")
                .and_then(Value::as_str)
        })
}

fn request_body(event: &Value) -> Result<Value, HandlerError> {
    match event.get("body") {
        None | Some(Value::Null) => Ok(json!({})),
        Some(Value::String(text)) => serde_json::from_str(text)
            .map_err(|error| HandlerError::internal(format!("Malformed JSON body: {error}"))),
        Some(other) => Ok(other.clone()),
    }
}

fn query_param<'a>(event: &'a Value, name: &str) -> Option<&'a str> {
    event
        .get("queryStringParameters")
        .and_then(|params| params.get(name))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryTelemetryStore;

    fn post(body: Value) -> Value {
        json!({"httpMethod": "POST", "body": body.to_string()})
    }

    fn patch(body: Value) -> Value {
        json!({"httpMethod": "PATCH", "body": body.to_string()})
    }

    fn get(params: Value) -> Value {
        json!({"httpMethod": "GET", "queryStringParameters": params})
    }

    fn handle(event: Value, store: &InMemoryTelemetryStore) -> ApiGatewayResponse {
        handle_ingest_event(event, store, &IngestSettings::default())
    }

    #[test]
    fn create_without_van_id_is_rejected() {
        let store = InMemoryTelemetryStore::default();
        let response = handle(post(json!({"clientID": "c1", "speed": "40"})), &store);

        assert_eq!(response.status_code, 400);
        assert_eq!(response.json_body(), json!({"message": "Missing vanID"}));
        assert!(store.is_empty());
    }

    #[test]
    fn create_echoes_the_record_and_persists_it_verbatim() {
        let store = InMemoryTelemetryStore::default();
        let body = json!({"vanID": "v1", "clientID": "c1", "speed": "40", "driver": "ana"});

        let response = handle(post(body.clone()), &store);
        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.json_body(),
            json!({"message": "Data inserted successfully", "item": body})
        );

        let stored = handle(get(json!({"vanID": "v1"})), &store);
        assert_eq!(stored.status_code, 200);
        assert_eq!(stored.json_body(), body);
    }

    #[test]
    fn create_replaces_rather_than_merges() {
        let store = InMemoryTelemetryStore::default();
        handle(post(json!({"vanID": "v1", "lat": 40.4, "lon": -3.7})), &store);
        handle(post(json!({"vanID": "v1", "speed": "55"})), &store);

        let stored = handle(get(json!({"vanID": "v1"})), &store).json_body();
        assert_eq!(stored, json!({"vanID": "v1", "speed": "55"}));
    }

    #[test]
    fn accepts_inline_object_bodies() {
        let store = InMemoryTelemetryStore::default();
        let response = handle(
            json!({"httpMethod": "POST", "body": {"vanID": "v7"}}),
            &store,
        );
        assert_eq!(response.status_code, 200);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn malformed_json_is_an_internal_error() {
        let store = InMemoryTelemetryStore::default();
        let response = handle(
            json!({"httpMethod": "POST", "body": "{\"vanID\": "}),
            &store,
        );

        assert_eq!(response.status_code, 500);
        let message = response.json_body()["message"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        assert!(message.starts_with("Malformed JSON body"), "{message}");
    }

    #[test]
    fn update_changes_only_the_given_fields() {
        let store = InMemoryTelemetryStore::default();
        handle(
            post(json!({
                "vanID": "v1",
                "clientID": "c1",
                "speed": "40",
                "lat": 40.4,
                "lon": -3.7
            })),
            &store,
        );

        let response = handle(
            patch(json!({"vanID": "v1", "clientID": "c1", "speed": "120"})),
            &store,
        );

        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.json_body(),
            json!({
                "message": "Data updated successfully",
                "updatedItem": {
                    "vanID": "v1",
                    "clientID": "c1",
                    "speed": "120",
                    "lat": 40.4,
                    "lon": -3.7
                }
            })
        );
    }

    #[test]
    fn update_validation_failures() {
        let store = InMemoryTelemetryStore::default();

        let missing_key = handle(patch(json!({"vanID": "v1", "speed": "1"})), &store);
        assert_eq!(missing_key.status_code, 400);
        assert_eq!(
            missing_key.json_body(),
            json!({"message": "Missing vanID or clientID in request"})
        );

        let nothing = handle(
            patch(json!({"vanID": "v1", "clientID": "c1", "driver": "ana"})),
            &store,
        );
        assert_eq!(nothing.status_code, 400);
        assert_eq!(nothing.json_body(), json!({"message": "No fields to update"}));
    }

    #[test]
    fn update_from_another_client_is_rejected() {
        let store = InMemoryTelemetryStore::default();
        handle(post(json!({"vanID": "v1", "clientID": "c1"})), &store);

        let response = handle(
            patch(json!({"vanID": "v1", "clientID": "c2", "speed": "10"})),
            &store,
        );
        assert_eq!(response.status_code, 400);
    }

    #[test]
    fn point_read_of_unknown_van_is_not_found() {
        let store = InMemoryTelemetryStore::default();
        let response = handle(get(json!({"vanID": "ghost"})), &store);

        assert_eq!(response.status_code, 404);
        assert_eq!(response.json_body(), json!({"message": "Van not found"}));
    }

    #[test]
    fn full_read_spans_every_page() {
        let store = InMemoryTelemetryStore::default();
        for index in 0..7 {
            handle(post(json!({"vanID": format!("v{index}")})), &store);
        }
        handle(
            patch(json!({"vanID": "v3", "clientID": "c1", "speed": "12"})),
            &store,
        );

        let response = handle_ingest_event(
            json!({"httpMethod": "GET", "queryStringParameters": null}),
            &store,
            &IngestSettings {
                scan_page_size: 3,
                max_page_size: 10,
            },
        );

        assert_eq!(response.status_code, 200);
        let items = response.json_body();
        assert_eq!(items.as_array().map(Vec::len), Some(7));
    }

    #[test]
    fn full_read_of_empty_table_is_an_empty_array() {
        let store = InMemoryTelemetryStore::default();
        let response = handle(json!({"httpMethod": "GET"}), &store);
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "[]");
    }

    #[test]
    fn paged_read_returns_a_cursor() {
        let store = InMemoryTelemetryStore::default();
        for van_id in ["a", "b", "c"] {
            handle(post(json!({"vanID": van_id})), &store);
        }

        let first = handle(get(json!({"limit": "2"})), &store).json_body();
        assert_eq!(first["items"].as_array().map(Vec::len), Some(2));
        assert_eq!(first["nextCursor"], json!("b"));

        let second = handle(get(json!({"limit": "2", "cursor": "b"})), &store).json_body();
        assert_eq!(second["items"], json!([{"vanID": "c"}]));
        assert_eq!(second["nextCursor"], Value::Null);
    }

    #[test]
    fn cursor_only_read_defaults_to_a_limit_within_the_cap() {
        let store = InMemoryTelemetryStore::default();
        for van_id in ["a", "b", "c", "d"] {
            handle(post(json!({"vanID": van_id})), &store);
        }
        let settings = IngestSettings {
            scan_page_size: 5,
            max_page_size: 2,
        };

        let response = handle_ingest_event(get(json!({"cursor": "a"})), &store, &settings);
        assert_eq!(response.status_code, 200);
        let page = response.json_body();
        assert_eq!(page["items"], json!([{"vanID": "b"}, {"vanID": "c"}]));
        assert_eq!(page["nextCursor"], json!("c"));
    }

    #[test]
    fn paged_read_rejects_bad_limits() {
        let store = InMemoryTelemetryStore::default();
        let response = handle(get(json!({"limit": "0"})), &store);
        assert_eq!(response.status_code, 400);

        let response = handle(get(json!({"limit": "5000"})), &store);
        assert_eq!(response.status_code, 400);
    }

    #[test]
    fn http_api_events_are_routed_by_request_context() {
        let store = InMemoryTelemetryStore::default();
        let response = handle(
            json!({
                "requestContext": {"http": {"method": "POST"}},
                "body": "{\"vanID\":\"v2\"}"
            }),
            &store,
        );
        assert_eq!(response.status_code, 200);
    }

    #[test]
    fn unsupported_methods_are_rejected() {
        let store = InMemoryTelemetryStore::default();
        let response = handle(json!({"httpMethod": "DELETE"}), &store);

        assert_eq!(response.status_code, 405);
        assert_eq!(
            response.json_body(),
            json!({"message": "Method DELETE not allowed"})
        );
    }

    #[test]
    fn events_without_a_method_are_rejected() {
        let store = InMemoryTelemetryStore::default();
        let response = handle(json!({"body": "{}"}), &store);

        assert_eq!(response.status_code, 405);
        assert_eq!(
            response.json_body(),
            json!({"message": "Method UNKNOWN not allowed"})
        );
    }

    #[test]
    fn storage_failures_surface_as_internal_errors() {
        let store = InMemoryTelemetryStore::default();
        store.fail_with("ProvisionedThroughputExceededException");

        let response = handle(post(json!({"vanID": "v1"})), &store);
        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.json_body(),
            json!({"message": "ProvisionedThroughputExceededException"})
        );
    }
}
