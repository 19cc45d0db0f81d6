//! Transport seam between the sender and the mail API.
//!
//! - [`Transport`] issues the send request and hands back the response body
//! - [`ChunkSource`] yields that body chunk by chunk until end of input
//!
//! [`HttpTransport`] is the real implementation; [`ScriptedTransport`] replays
//! a fixed script and is used for tests and offline demos.

mod http;
mod scripted;

pub use http::HttpTransport;
pub use scripted::{ScriptStep, ScriptedTransport};

use crate::error::Result;
use crate::request::SendJobRequest;
use async_trait::async_trait;

/// A pull-based source of response body chunks
///
/// Chunk boundaries are arbitrary and carry no meaning.
#[async_trait]
pub trait ChunkSource: Send {
    /// Wait for the next chunk
    ///
    /// Returns `Ok(None)` once the body is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Issues the streaming send request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` authorized with `access_token` and open the progress stream
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the endpoint answers
    /// with a non-success status.
    async fn open(
        &self,
        access_token: &str,
        request: &SendJobRequest,
    ) -> Result<Box<dyn ChunkSource>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
