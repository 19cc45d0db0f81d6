//! Transport replaying a fixed script of chunks.

use super::{ChunkSource, Transport};
use crate::error::{Error, Result};
use crate::request::SendJobRequest;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// One step of a scripted response body
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptStep {
    /// Deliver these bytes as one chunk
    Chunk(Vec<u8>),
    /// Wait before the next step
    Pause(Duration),
    /// Fail the read as if the connection dropped
    Fail(String),
    /// Never produce anything again
    Hang,
}

impl ScriptStep {
    /// Chunk from text
    pub fn text(chunk: impl Into<String>) -> Self {
        ScriptStep::Chunk(chunk.into().into_bytes())
    }
}

/// Transport that answers every request with the same scripted body
///
/// Keeps count of how many requests were opened, which lets callers check that
/// rejected submissions never reached the network.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTransport {
    steps: Vec<ScriptStep>,
    open_error: Option<String>,
    opens: Arc<AtomicUsize>,
    last_token: Arc<Mutex<Option<String>>>,
}

impl ScriptedTransport {
    /// Transport replaying `steps` on every open
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Transport whose body is `body` split into chunks of `chunk_size` bytes
    pub fn chunked(body: &[u8], chunk_size: usize) -> Self {
        let steps = body
            .chunks(chunk_size.max(1))
            .map(|c| ScriptStep::Chunk(c.to_vec()))
            .collect();
        Self::new(steps)
    }

    /// Transport whose request is refused with a connection error
    pub fn refusing(reason: impl Into<String>) -> Self {
        Self {
            open_error: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Number of requests opened so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Token presented with the most recent request
    pub fn last_token(&self) -> Option<String> {
        self.last_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(
        &self,
        access_token: &str,
        _request: &SendJobRequest,
    ) -> Result<Box<dyn ChunkSource>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self
            .last_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(access_token.to_string());

        if let Some(reason) = &self.open_error {
            return Err(connection_error(std::io::ErrorKind::ConnectionRefused, reason));
        }

        Ok(Box::new(ScriptedSource {
            steps: self.steps.iter().cloned().collect(),
        }))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn connection_error(kind: std::io::ErrorKind, reason: &str) -> Error {
    Error::Io(std::io::Error::new(kind, reason.to_string()))
}

struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
}

#[async_trait]
impl ChunkSource for ScriptedSource {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(step) = self.steps.pop_front() {
            match step {
                ScriptStep::Chunk(bytes) => return Ok(Some(bytes)),
                ScriptStep::Pause(duration) => tokio::time::sleep(duration).await,
                ScriptStep::Fail(reason) => {
                    return Err(connection_error(
                        std::io::ErrorKind::ConnectionReset,
                        &reason,
                    ));
                }
                ScriptStep::Hang => {
                    self.steps.push_front(ScriptStep::Hang);
                    futures::future::pending::<()>().await;
                }
            }
        }
        Ok(None)
    }
}
