use fleet_telemetry_core::alert::SpeedPolicy;
use fleet_telemetry_lambda::adapters::dynamo::DynamoClientDirectory;
use fleet_telemetry_lambda::adapters::webhook::ReqwestWebhookNotifier;
use fleet_telemetry_lambda::config::NotificationConfig;
use fleet_telemetry_lambda::handlers::notify::handle_stream_event;
use fleet_telemetry_lambda::handlers::response::ApiGatewayResponse;
use fleet_telemetry_lambda::logging;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

struct RuntimeDependencies {
    policy: SpeedPolicy,
    directory: DynamoClientDirectory,
    notifier: ReqwestWebhookNotifier,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<ApiGatewayResponse, Error> {
    Ok(handle_stream_event(
        &event.payload,
        &deps.policy,
        &deps.directory,
        &deps.notifier,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logging::init();

    let config = NotificationConfig::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        policy: config.speed_policy(),
        directory: DynamoClientDirectory::new(
            aws_sdk_dynamodb::Client::new(&aws_config),
            config.client_table.clone(),
        ),
        notifier: ReqwestWebhookNotifier::new(reqwest::Client::builder().build()?),
    };

    lambda_runtime::run(service_fn(|event: LambdaEvent<Value>| {
        handle_request(event, &deps)
    }))
    .await
}
