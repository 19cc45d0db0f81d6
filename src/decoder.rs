//! Incremental decoder for the progress stream
//!
//! The response body arrives in chunks whose boundaries have nothing to do with
//! record boundaries. The decoder keeps a carry-over buffer and hands out one
//! complete [`StreamFrame`] at a time:
//!
//! ```text
//! data: {"type":"log","data":"..."}\n
//! \n
//! data: {"type":"progress","data":{...}}\n
//! \n
//! ```
//!
//! Records are separated by a blank line (`\n\n`). A record is only complete once
//! its trailing delimiter has arrived, so whatever follows the last delimiter
//! stays buffered. UTF-8 sequences split across chunks are reassembled before
//! being appended to the buffer.

use crate::error::Result;
use crate::frame::StreamFrame;

/// Record delimiter
pub const RECORD_DELIMITER: &str = "\n\n";

/// Buffered frame decoder that handles partial chunks
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Carry-over text not yet terminated by a delimiter
    buffer: String,
    /// Trailing bytes of a UTF-8 sequence cut by a chunk boundary
    incomplete_utf8: Vec<u8>,
}

impl FrameDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk to the carry-over buffer
    ///
    /// No frames are decoded here; pull them with [`FrameDecoder::next_frame`].
    pub fn push(&mut self, chunk: &[u8]) {
        let bytes = if self.incomplete_utf8.is_empty() {
            chunk.to_vec()
        } else {
            let mut combined = std::mem::take(&mut self.incomplete_utf8);
            combined.extend_from_slice(chunk);
            combined
        };

        let (text, remainder) = decode_utf8_with_remainder(&bytes);
        self.buffer.push_str(&text);
        self.incomplete_utf8 = remainder;
    }

    /// Append text that is already decoded
    pub fn push_str(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    /// Take the next complete frame out of the buffer
    ///
    /// Records without the `data: ` prefix are skipped. Returns `None` once no
    /// complete record remains; the partial tail stays buffered for the next
    /// chunk. A malformed record is consumed and reported as an error.
    pub fn next_frame(&mut self) -> Option<Result<StreamFrame>> {
        while let Some(end) = self.buffer.find(RECORD_DELIMITER) {
            let record: String = self.buffer.drain(..end + RECORD_DELIMITER.len()).collect();
            let record = &record[..end];

            match StreamFrame::parse_record(record) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => {
                    if !record.is_empty() {
                        tracing::debug!(record, "Ignoring record without data prefix");
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }

    /// Append a chunk and decode every frame it completes
    ///
    /// Stops at the first malformed record.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamFrame>> {
        self.push(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame() {
            frames.push(frame?);
        }
        Ok(frames)
    }

    /// End of input: drop and return any unterminated carry-over
    ///
    /// A record without its trailing delimiter is never decoded. The dropped text
    /// is returned so the caller can report it.
    pub fn finish(&mut self) -> Option<String> {
        let mut leftover = std::mem::take(&mut self.buffer);
        if !self.incomplete_utf8.is_empty() {
            leftover.push_str(&String::from_utf8_lossy(&self.incomplete_utf8));
            self.incomplete_utf8.clear();
        }
        if leftover.is_empty() {
            None
        } else {
            Some(leftover)
        }
    }

    /// Check if there's remaining data in the buffer
    pub fn has_remaining(&self) -> bool {
        !self.buffer.is_empty() || !self.incomplete_utf8.is_empty()
    }

    /// Get remaining buffered text (for debugging)
    pub fn remaining(&self) -> &str {
        &self.buffer
    }
}

/// Decode bytes as UTF-8, returning the valid text and any trailing incomplete sequence
///
/// Invalid sequences in the middle of a chunk are replaced rather than
/// rejected; only a sequence cut off at the very end is carried over.
fn decode_utf8_with_remainder(bytes: &[u8]) -> (String, Vec<u8>) {
    let mut text = String::with_capacity(bytes.len());
    let mut rest = bytes;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                text.push_str(valid);
                return (text, Vec::new());
            }
            Err(e) => {
                let (valid, tail) = rest.split_at(e.valid_up_to());
                text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(bad) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        rest = &tail[bad..];
                    }
                    // Input ends inside a sequence
                    None => return (text, tail.to_vec()),
                }
            }
        }
    }
}
