//! Maps decoded frames to session commands.
//!
//! Interpretation is a pure function of the frame (plus the receive time); the
//! resulting [`Command`] is applied by [`SessionState::apply`](crate::state::SessionState::apply).

use crate::frame::StreamFrame;
use crate::types::{DeliveryStatus, LogLine, RecipientResult, SendCounts};
use chrono::{DateTime, Local};

/// A state mutation derived from one frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Append a line to the running log
    AppendLog(LogLine),
    /// Record a per-recipient outcome and its log line
    RecordResult {
        /// The result row
        result: RecipientResult,
        /// Log line describing it
        log: LogLine,
    },
    /// The job completed
    Complete {
        /// Final counts from the server
        counts: SendCounts,
        /// Summary log line
        log: LogLine,
    },
    /// The server reported a fatal error
    Fail {
        /// Message shown to the user verbatim
        message: String,
        /// Fatal log line
        log: LogLine,
    },
    /// Frame kind this client does not handle
    Ignore {
        /// The unrecognized tag
        kind: String,
    },
}

impl Command {
    /// Whether applying this command ends the attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, Command::Complete { .. } | Command::Fail { .. })
    }
}

/// Interpret a frame received now
pub fn interpret(frame: StreamFrame) -> Command {
    interpret_at(frame, Local::now())
}

/// Interpret a frame received at `received_at`
///
/// A failed progress frame without provider error text is logged as
/// `ERROR: Failed to send to <email>: unknown error`.
pub fn interpret_at(frame: StreamFrame, received_at: DateTime<Local>) -> Command {
    match frame {
        StreamFrame::Log(text) => Command::AppendLog(format!("STATUS: {text}").into()),
        StreamFrame::Progress(progress) => {
            let log = match progress.status {
                DeliveryStatus::Sent => format!("PROGRESS: Sent → {}", progress.email),
                DeliveryStatus::Failed => format!(
                    "ERROR: Failed to send to {}: {}",
                    progress.email,
                    progress.error.as_deref().unwrap_or("unknown error")
                ),
            };
            Command::RecordResult {
                result: RecipientResult {
                    email: progress.email,
                    status: progress.status,
                    received_at,
                },
                log: log.into(),
            }
        }
        StreamFrame::Complete(complete) => Command::Complete {
            counts: SendCounts {
                sent: complete.sent,
                failed: complete.failed,
            },
            log: format!("--- {} ---", complete.message).into(),
        },
        StreamFrame::Error(error) => Command::Fail {
            log: format!("FATAL: {}", error.message).into(),
            message: error.message,
        },
        StreamFrame::Unknown(kind) => Command::Ignore { kind },
    }
}
