use std::collections::BTreeMap;

use fleet_telemetry_core::alert::{Assessment, SpeedPolicy};
use fleet_telemetry_core::change::{batch_records, ChangeEvent};
use fleet_telemetry_core::error::HandlerError;
use fleet_telemetry_core::record::ClientRecord;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::adapters::client_directory::ClientDirectory;
use crate::adapters::notifier::AlertNotifier;
use crate::handlers::response::{error_response, json_response, ApiGatewayResponse};

/// What happened to a single stream record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Malformed,
    Ignored,
    MissingFields,
    UnparsableSpeed,
    WithinLimit,
    LookupFailed,
    NoWebhook,
    DeliveryFailed,
    Notified,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub records: usize,
    pub outcomes: BTreeMap<RecordOutcome, usize>,
}

impl BatchSummary {
    fn record(&mut self, outcome: RecordOutcome) {
        self.records += 1;
        *self.outcomes.entry(outcome).or_default() += 1;
    }

    pub fn count(&self, outcome: RecordOutcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or_default()
    }
}

/// Handles one DynamoDB Streams batch and acknowledges it.
pub fn handle_stream_event(
    event: &Value,
    policy: &SpeedPolicy,
    directory: &dyn ClientDirectory,
    notifier: &dyn AlertNotifier,
) -> ApiGatewayResponse {
    match process_stream_batch(event, policy, directory, notifier) {
        Ok(summary) => {
            info!(
                records = summary.records,
                notified = summary.count(RecordOutcome::Notified),
                "stream batch processed"
            );
            json_response(
                200,
                json!({
                    "message": "Stream processed successfully",
                    "summary": summary,
                }),
            )
        }
        Err(failure) => {
            error!(error = %failure, "error processing stream");
            error_response(&failure)
        }
    }
}

/// Evaluates every record of the batch in order. Only an unusable batch
/// envelope fails; per-record problems end up in the summary.
pub fn process_stream_batch(
    event: &Value,
    policy: &SpeedPolicy,
    directory: &dyn ClientDirectory,
    notifier: &dyn AlertNotifier,
) -> Result<BatchSummary, HandlerError> {
    let records = batch_records(event)?;
    debug!(records = records.len(), "stream batch received");

    let mut summary = BatchSummary::default();
    for record in records {
        summary.record(process_record(record, policy, directory, notifier));
    }
    Ok(summary)
}

fn process_record(
    record: &Value,
    policy: &SpeedPolicy,
    directory: &dyn ClientDirectory,
    notifier: &dyn AlertNotifier,
) -> RecordOutcome {
    let event = match ChangeEvent::from_record(record) {
        Ok(event) => event,
        Err(message) => {
            warn!(error = %message, "skipping malformed stream record");
            return RecordOutcome::Malformed;
        }
    };
    let event_id = event.event_id.as_deref().unwrap_or_default();

    match policy.assess(&event) {
        Assessment::Ignored { kind } => {
            debug!(event_id, kind = %kind, "ignoring stream record");
            RecordOutcome::Ignored
        }
        Assessment::MissingFields => {
            debug!(event_id, "stream record has no clientID or speed");
            RecordOutcome::MissingFields
        }
        Assessment::UnparsableSpeed { client_id, raw } => {
            warn!(event_id, client_id = %client_id, speed = %raw, "speed is not a number");
            RecordOutcome::UnparsableSpeed
        }
        Assessment::WithinLimit { .. } => RecordOutcome::WithinLimit,
        Assessment::OverLimit { client_id, speed } => {
            info!(
                event_id,
                client_id = %client_id,
                speed,
                limit = policy.limit_kmh(),
                "speed limit exceeded"
            );
            notify_client(&client_id, speed, policy, directory, notifier)
        }
    }
}

fn notify_client(
    client_id: &str,
    speed: f64,
    policy: &SpeedPolicy,
    directory: &dyn ClientDirectory,
    notifier: &dyn AlertNotifier,
) -> RecordOutcome {
    let client = match directory.get_client(client_id) {
        Ok(client) => client,
        Err(failure) => {
            error!(client_id, error = %failure, "client lookup failed");
            return RecordOutcome::LookupFailed;
        }
    };

    let Some(webhook) = client.as_ref().and_then(ClientRecord::webhook) else {
        warn!(client_id, "no webhook found for client");
        return RecordOutcome::NoWebhook;
    };

    match notifier.post_alert(webhook, &policy.alert_for(speed)) {
        Ok(()) => {
            info!(client_id, "speed alert sent");
            RecordOutcome::Notified
        }
        Err(failure) => {
            error!(client_id, error = %failure, "failed to send speed alert");
            RecordOutcome::DeliveryFailed
        }
    }
}
