//! # bulk-mailer
//!
//! Client-side controller for streaming bulk mail jobs.
//!
//! A job (recipients spreadsheet, optional attachment, subject, body, delay) is
//! posted to a mail API that answers with a long-lived `text/event-stream`
//! body. The controller decodes that stream incrementally, turns each frame
//! into a state change, and exposes the session through snapshots and a
//! broadcast event channel.
//!
//! - [`decoder`] splits arbitrary byte chunks into `data:` records
//! - [`interpreter`] maps frames to session commands
//! - [`state`] is the session state machine (idle, sending, success, error, cancelled)
//! - [`BulkSender`] orchestrates submission and cancellation
//! - [`report`] exports per-recipient results as CSV
//!
//! ## Quick Start
//!
//! ```no_run
//! use bulk_mailer::auth::StaticTokenProvider;
//! use bulk_mailer::request::{FileBlob, SendJobRequest};
//! use bulk_mailer::{BulkSender, Config};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let tokens = Arc::new(StaticTokenProvider::from_env("BULK_MAILER_TOKEN")?);
//!     let sender = BulkSender::with_http(config, tokens)?;
//!
//!     let mut events = sender.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = SendJobRequest::builder()
//!         .recipients(FileBlob::from_path("recipients.xlsx").await?)
//!         .subject("Important Company Update")
//!         .body_text("Hello everyone")
//!         .delay_secs(5)
//!         .build();
//!
//!     let snapshot = sender.submit(&request).await?;
//!     println!("sent {} / failed {}", snapshot.counts.sent, snapshot.counts.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Credential providers
pub mod auth;
/// Configuration types
pub mod config;
/// Incremental stream decoder
pub mod decoder;
/// Error types
pub mod error;
/// Stream frame model
pub mod frame;
/// Frame interpretation
pub mod interpreter;
/// CSV report export
pub mod report;
/// Send requests and the composer draft
pub mod request;
/// Send orchestrator
pub mod sender;
/// Session state machine
pub mod state;
/// Request transports
pub mod transport;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use auth::{SignedOutProvider, StaticTokenProvider, TokenProvider};
pub use config::Config;
pub use error::{Error, Result, ValidationError};
pub use frame::StreamFrame;
pub use request::{BodyContent, ComposerDraft, FileBlob, SendJobRequest};
pub use sender::BulkSender;
pub use transport::{ChunkSource, HttpTransport, Transport};
pub use types::{
    DeliveryStatus, LogKind, LogLine, Phase, RecipientResult, SendCounts, SessionEvent,
    SessionSnapshot,
};

/// Cancel the sender's attempt in flight when the process is asked to stop.
///
/// Waits for a termination signal, then calls [`BulkSender::cancel`]. Returns
/// whether an attempt was cancelled.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to `ctrl_c` if
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use bulk_mailer::{BulkSender, Config, SignedOutProvider, cancel_on_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let sender = BulkSender::with_http(Config::default(), Arc::new(SignedOutProvider))?;
///     tokio::spawn(cancel_on_shutdown(sender.clone()));
///     Ok(())
/// }
/// ```
pub async fn cancel_on_shutdown(sender: BulkSender) -> bool {
    wait_for_signal().await;
    sender.cancel()
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        return;
    }
    tracing::info!("Received Ctrl+C signal");
}
