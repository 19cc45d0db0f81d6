//! Error types for bulk-mailer
//!
//! Every failure is terminal for the current send attempt. The taxonomy mirrors
//! where the failure happened:
//! - Validation (pre-flight, never reaches the network)
//! - Credential acquisition
//! - Transport (network, HTTP status, missing body)
//! - Protocol (malformed frame in the progress stream)
//! - Server-reported (`error` frame)
//!
//! Cancellation is modelled as [`Error::Cancelled`] so it can travel through `?`,
//! but the session never records it as an error phase.

use thiserror::Error;

/// Result type alias for bulk-mailer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Generic message shown to the user for credential, transport and protocol failures.
///
/// The underlying cause is written to the session log instead.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "An unexpected error occurred. Check the logs for details.";

/// Main error type for bulk-mailer
#[derive(Debug, Error)]
pub enum Error {
    /// Request failed pre-flight validation
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The credential provider could not produce a bearer token
    #[error("credential error: {0}")]
    Credential(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The send endpoint answered with a non-success status
    #[error("send endpoint returned HTTP {status}: {body}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Response body text (may be empty)
        body: String,
    },

    /// The response carried no body to stream
    #[error("response body is missing")]
    MissingBody,

    /// A `data:` record in the progress stream could not be decoded
    #[error("protocol error: {message}")]
    Protocol {
        /// What was wrong with the record
        message: String,
        /// The offending record text
        record: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stream ended before a `complete` or `error` frame arrived
    #[error("progress stream ended before the job reported completion")]
    StreamEnded,

    /// The server reported a fatal error frame
    #[error("server error: {0}")]
    Server(String),

    /// A send is already in flight for this session
    #[error("a send is already in progress")]
    SessionBusy,

    /// The attempt was cancelled by the user
    #[error("cancelled")]
    Cancelled,

    /// There are no results to export
    #[error("no results to export")]
    EmptyReport,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api_base_url")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pre-flight validation failures for a send request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No recipients spreadsheet was supplied
    #[error("Please select a recipient Excel file.")]
    MissingRecipients,

    /// Attachment exceeds the configured size limit
    #[error("Attachment is too large. Please select a file under {}.", format_limit(.limit))]
    AttachmentTooLarge {
        /// Size of the rejected attachment in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// Delay between messages is outside the allowed range
    #[error("Delay must be between {min} and {max} seconds, got {delay}.")]
    DelayOutOfRange {
        /// Requested delay in seconds
        delay: u32,
        /// Lower bound (inclusive)
        min: u32,
        /// Upper bound (inclusive)
        max: u32,
    },
}

/// Render a byte limit the way users see it ("4.5 MB")
fn format_limit(limit: &u64) -> String {
    let mib = *limit as f64 / (1024.0 * 1024.0);
    let text = format!("{mib:.1}");
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{text} MB")
}

impl Error {
    /// Build a protocol error for an offending record
    pub fn protocol(message: impl Into<String>, record: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
            record: record.into(),
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Validation(e) => match e {
                ValidationError::MissingRecipients => "missing_recipients",
                ValidationError::AttachmentTooLarge { .. } => "attachment_too_large",
                ValidationError::DelayOutOfRange { .. } => "delay_out_of_range",
            },
            Error::Credential(_) => "credential_error",
            Error::Network(_) => "network_error",
            Error::HttpStatus { .. } => "http_status",
            Error::MissingBody => "missing_body",
            Error::Protocol { .. } => "protocol_error",
            Error::Serialization(_) => "serialization_error",
            Error::StreamEnded => "stream_ended",
            Error::Server(_) => "server_error",
            Error::SessionBusy => "session_busy",
            Error::Cancelled => "cancelled",
            Error::EmptyReport => "empty_report",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
        }
    }

    /// The single message a user should see for this failure
    ///
    /// Validation and server-reported errors are shown verbatim; everything else
    /// collapses to [`GENERIC_FAILURE_MESSAGE`].
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(e) => e.to_string(),
            Error::Server(message) => message.clone(),
            Error::SessionBusy | Error::EmptyReport => self.to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    /// Whether this error is the cancellation marker rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
