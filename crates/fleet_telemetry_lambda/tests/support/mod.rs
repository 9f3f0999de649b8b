use std::sync::Mutex;

use fleet_telemetry_core::alert::AlertMessage;
use fleet_telemetry_lambda::adapters::notifier::{AlertNotifier, NotifyError};
use serde_json::{json, Value};

#[derive(Default)]
pub struct CapturingNotifier {
    posts: Mutex<Vec<(String, AlertMessage)>>,
}

impl CapturingNotifier {
    pub fn posts(&self) -> Vec<(String, AlertMessage)> {
        self.posts.lock().expect("poisoned mutex").clone()
    }
}

impl AlertNotifier for CapturingNotifier {
    fn post_alert(&self, webhook_url: &str, message: &AlertMessage) -> Result<(), NotifyError> {
        self.posts
            .lock()
            .expect("poisoned mutex")
            .push((webhook_url.to_string(), message.clone()));
        Ok(())
    }
}

pub fn rest_event(method: &str, body: Option<Value>, query: Option<Value>) -> Value {
    json!({
        "httpMethod": method,
        "body": body.map(|value| value.to_string()),
        "queryStringParameters": query,
    })
}

/// Stream record as DynamoDB Streams delivers it for a string-typed image.
pub fn stream_record(event_name: &str, image: &[(&str, &str)]) -> Value {
    let new_image: serde_json::Map<String, Value> = image
        .iter()
        .map(|(name, value)| (name.to_string(), json!({ "S": value })))
        .collect();
    json!({
        "eventID": format!("{event_name}-1"),
        "eventName": event_name,
        "eventSource": "aws:dynamodb",
        "dynamodb": { "NewImage": new_image }
    })
}
