//! Progress stream frame taxonomy.
//!
//! Each record on the wire is `data: ` followed by a JSON envelope
//! `{"type": ..., "data": ...}`. The envelope is parsed first and the payload is
//! then decoded according to its tag, so an unknown tag never fails decoding.

use crate::error::{Error, Result};
use crate::types::DeliveryStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix every meaningful record starts with
pub const DATA_PREFIX: &str = "data: ";

/// Payload of a `progress` frame
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPayload {
    /// Recipient address
    pub email: String,
    /// Delivery outcome; any status other than `sent` counts as failed
    #[serde(default = "failed_status", deserialize_with = "sent_or_failed")]
    pub status: DeliveryStatus,
    /// Provider error text for failed deliveries (may be absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload of a `complete` frame
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletePayload {
    /// Messages accepted
    pub sent: u64,
    /// Messages rejected
    pub failed: u64,
    /// Summary message
    pub message: String,
}

/// Payload of an `error` frame
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error description, shown to the user verbatim
    pub message: String,
}

/// A single decoded unit of the progress stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFrame {
    /// Informational status line
    Log(String),
    /// Outcome for one recipient
    Progress(ProgressPayload),
    /// The job finished
    Complete(CompletePayload),
    /// The job failed on the server
    Error(ErrorPayload),
    /// A frame kind this client does not know; carries the tag
    Unknown(String),
}

impl StreamFrame {
    /// Whether this frame ends the job
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFrame::Complete(_) | StreamFrame::Error(_))
    }

    /// Wire tag of this frame
    pub fn kind(&self) -> &str {
        match self {
            StreamFrame::Log(_) => "log",
            StreamFrame::Progress(_) => "progress",
            StreamFrame::Complete(_) => "complete",
            StreamFrame::Error(_) => "error",
            StreamFrame::Unknown(kind) => kind,
        }
    }

    /// Decode one record (the text between two `\n\n` delimiters)
    ///
    /// Returns `Ok(None)` for records without the `data: ` prefix, which are
    /// ignored. Malformed JSON or a payload that does not match its tag is a
    /// protocol error.
    pub fn parse_record(record: &str) -> Result<Option<Self>> {
        let Some(json) = record.strip_prefix(DATA_PREFIX) else {
            return Ok(None);
        };

        let envelope: Envelope = serde_json::from_str(json)
            .map_err(|e| Error::protocol(format!("malformed frame JSON: {e}"), record))?;

        let frame = match envelope.kind.as_str() {
            "log" => StreamFrame::Log(log_text(envelope.data)),
            "progress" => StreamFrame::Progress(payload(envelope.data, record)?),
            "complete" => StreamFrame::Complete(payload(envelope.data, record)?),
            "error" => StreamFrame::Error(payload(envelope.data, record)?),
            _ => StreamFrame::Unknown(envelope.kind),
        };

        Ok(Some(frame))
    }

    /// Encode as a wire record, including the trailing delimiter
    pub fn to_record(&self) -> Result<String> {
        let (kind, data) = match self {
            StreamFrame::Log(text) => ("log", Value::String(text.clone())),
            StreamFrame::Progress(p) => ("progress", serde_json::to_value(p)?),
            StreamFrame::Complete(c) => ("complete", serde_json::to_value(c)?),
            StreamFrame::Error(e) => ("error", serde_json::to_value(e)?),
            StreamFrame::Unknown(kind) => (kind.as_str(), Value::Null),
        };
        let envelope = serde_json::json!({ "type": kind, "data": data });
        Ok(format!("{DATA_PREFIX}{envelope}\n\n"))
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

fn failed_status() -> DeliveryStatus {
    DeliveryStatus::Failed
}

/// Only the exact string `sent` is a success
fn sent_or_failed<'de, D>(deserializer: D) -> std::result::Result<DeliveryStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let status = Value::deserialize(deserializer)?;
    Ok(match status.as_str() {
        Some("sent") => DeliveryStatus::Sent,
        _ => DeliveryStatus::Failed,
    })
}

fn payload<T: serde::de::DeserializeOwned>(data: Value, record: &str) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| Error::protocol(format!("unexpected frame payload: {e}"), record))
}

/// `log` payloads are strings; anything else is rendered as JSON text
fn log_text(data: Value) -> String {
    match data {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
