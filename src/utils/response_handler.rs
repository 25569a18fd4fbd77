// JSON envelope for the gateway's own endpoints (health, endpoint listing).
// Routine results are written as-is and never pass through here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::utils::utils::to_two_space_indented_json;

/// Body shape of every admin response
#[derive(Debug, Serialize)]
pub struct Envelope {
    /// Upper-snake reason phrase, e.g. "SERVICE_UNAVAILABLE"
    pub status: String,
    pub code: u16,
    pub data: Value,
    pub messages: Vec<String>,
    pub date: String,
}

/// Builder used by admin handlers
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    pub status_code: StatusCode,
    pub data: Value,
    pub messages: Vec<String>,
}

impl HandlerResponse {
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            data: Value::Null,
            messages: Vec::new(),
        }
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    fn envelope(self) -> Envelope {
        Envelope {
            status: status_label(self.status_code),
            code: self.status_code.as_u16(),
            data: self.data,
            messages: self.messages,
            date: Utc::now().to_rfc3339(),
        }
    }
}

fn status_label(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("UNKNOWN STATUS")
        .to_uppercase()
        .replace(' ', "_")
}

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        let status: StatusCode = self.status_code;
        let envelope: Envelope = self.envelope();

        match to_two_space_indented_json(&envelope) {
            Ok(pretty) => debug!("\nAdmin response:\n{}", pretty),
            Err(err) => error!("Failed to format response JSON: {:?}", err),
        }

        (status, Json(envelope)).into_response()
    }
}
