use fleet_telemetry_core::error::HandlerError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// API Gateway proxy response. Both Lambdas answer in this shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

impl ApiGatewayResponse {
    /// Parses the body back into JSON; `Value::Null` if it is not JSON.
    pub fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

pub fn json_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    raw_json_response(status_code, payload.to_string())
}

/// For bodies serialized incrementally by the caller.
pub fn raw_json_response(status_code: u16, body: String) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: json!({"Content-Type": "application/json"}),
        body,
    }
}

pub fn error_response(error: &HandlerError) -> ApiGatewayResponse {
    json_response(error.status_code(), json!({ "message": error.to_string() }))
}
