use fleet_telemetry_lambda::adapters::dynamo::DynamoTelemetryStore;
use fleet_telemetry_lambda::config::IngestConfig;
use fleet_telemetry_lambda::handlers::ingest::{handle_ingest_event, IngestSettings};
use fleet_telemetry_lambda::handlers::response::ApiGatewayResponse;
use fleet_telemetry_lambda::logging;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

async fn handle_request(
    event: LambdaEvent<Value>,
    store: &DynamoTelemetryStore,
    settings: &IngestSettings,
) -> Result<ApiGatewayResponse, Error> {
    Ok(handle_ingest_event(event.payload, store, settings))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logging::init();

    let config = IngestConfig::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = DynamoTelemetryStore::new(
        aws_sdk_dynamodb::Client::new(&aws_config),
        config.telemetry_table.clone(),
    );
    let settings = config.ingest_settings();

    lambda_runtime::run(service_fn(|event: LambdaEvent<Value>| {
        handle_request(event, &store, &settings)
    }))
    .await
}
