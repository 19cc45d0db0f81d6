//! Core types for bulk-mailer

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a send session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nothing submitted yet, or cleared
    #[default]
    Idle,
    /// A job is in flight
    Sending,
    /// The server reported completion
    Success,
    /// The attempt failed (validation, credential, transport, protocol or server error)
    Error,
    /// The user cancelled the attempt
    Cancelled,
}

impl Phase {
    /// Whether a new submission may start from this phase
    pub fn accepts_submit(&self) -> bool {
        !matches!(self, Phase::Sending)
    }

    /// Whether this phase ends an attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Success | Phase::Error | Phase::Cancelled)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Sending => "sending",
            Phase::Success => "success",
            Phase::Error => "error",
            Phase::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Outcome of a single recipient
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// The message was accepted by the mail provider
    Sent,
    /// The mail provider rejected the message
    Failed,
}

impl DeliveryStatus {
    /// Wire/report token for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One per-recipient result row, in arrival order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientResult {
    /// Recipient address
    pub email: String,
    /// Delivery outcome
    pub status: DeliveryStatus,
    /// Local time the progress frame was received
    pub received_at: DateTime<Local>,
}

impl RecipientResult {
    /// Result row stamped with the current local time
    pub fn now(email: impl Into<String>, status: DeliveryStatus) -> Self {
        Self {
            email: email.into(),
            status,
            received_at: Local::now(),
        }
    }
}

/// Final counts reported by the server's `complete` frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendCounts {
    /// Messages accepted
    pub sent: u64,
    /// Messages rejected
    pub failed: u64,
}

/// Display class of a log line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Per-recipient failure
    Error,
    /// Per-recipient success
    Progress,
    /// Everything else
    Info,
}

/// A line in the session's running log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogLine(pub String);

impl LogLine {
    /// The line text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify by prefix
    pub fn kind(&self) -> LogKind {
        if self.0.starts_with("ERROR:") {
            LogKind::Error
        } else if self.0.starts_with("PROGRESS:") {
            LogKind::Progress
        } else {
            LogKind::Info
        }
    }
}

impl From<String> for LogLine {
    fn from(line: String) -> Self {
        Self(line)
    }
}

impl From<&str> for LogLine {
    fn from(line: &str) -> Self {
        Self(line.to_string())
    }
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-in-time copy of a session's state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Attempt counter, incremented on every submission
    pub attempt: u64,
    /// Current phase
    pub phase: Phase,
    /// Running log, in arrival order
    pub logs: Vec<LogLine>,
    /// Per-recipient results, in arrival order
    pub results: Vec<RecipientResult>,
    /// Final counts (zero until `complete` is applied)
    pub counts: SendCounts,
    /// The message the user should see for the last failure
    pub last_error: Option<String>,
    /// When the server reported completion
    pub completed_at: Option<DateTime<Local>>,
}

/// Events broadcast to session subscribers
///
/// Consumers subscribe via [`BulkSender::subscribe`](crate::BulkSender::subscribe).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Phase transition
    PhaseChanged {
        /// Attempt the transition belongs to
        attempt: u64,
        /// New phase
        phase: Phase,
    },

    /// A log line was appended
    Log {
        /// Attempt the line belongs to
        attempt: u64,
        /// The line
        line: LogLine,
    },

    /// A per-recipient result was recorded
    Result {
        /// Attempt the result belongs to
        attempt: u64,
        /// The result row
        result: RecipientResult,
    },

    /// The server reported completion
    Completed {
        /// Attempt that completed
        attempt: u64,
        /// Final counts
        counts: SendCounts,
    },

    /// The attempt failed
    Failed {
        /// Attempt that failed
        attempt: u64,
        /// User-facing message
        message: String,
    },

    /// The user cancelled the attempt
    Cancelled {
        /// Attempt that was cancelled
        attempt: u64,
    },

    /// All accumulated state was wiped
    Cleared,
}
