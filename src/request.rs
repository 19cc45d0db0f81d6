//! Send job input: files, body content and the composer draft they come from.

use crate::config::Config;
use crate::error::ValidationError;
use std::path::Path;

/// An in-memory file selected by the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileBlob {
    /// Original file name (sent as the multipart filename)
    pub name: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl FileBlob {
    /// Wrap a name and contents
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keeping its file name
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Ok(Self { name, bytes })
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// MIME type inferred from the file extension
    pub fn mime_type(&self) -> &'static str {
        let ext = Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Some("xls") => "application/vnd.ms-excel",
            Some("csv") => "text/csv",
            Some("pdf") => "application/pdf",
            Some("txt") => "text/plain",
            _ => "application/octet-stream",
        }
    }
}

/// Message body as produced by the editor
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BodyContent {
    /// Plain text, sent as `bodyText`
    Text(String),
    /// Rendered HTML, sent as `bodyHtml`
    Html(String),
}

impl BodyContent {
    /// Multipart field name for this body mode
    pub fn field_name(&self) -> &'static str {
        match self {
            BodyContent::Text(_) => "bodyText",
            BodyContent::Html(_) => "bodyHtml",
        }
    }

    /// The body text
    pub fn content(&self) -> &str {
        match self {
            BodyContent::Text(s) | BodyContent::Html(s) => s,
        }
    }
}

impl Default for BodyContent {
    fn default() -> Self {
        BodyContent::Text(String::new())
    }
}

/// Immutable input to one send attempt
///
/// The recipients source is optional here so that a missing file can be
/// reported through the session like any other failure. Use
/// [`SendJobRequest::builder`] to construct one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendJobRequest {
    /// Recipients spreadsheet
    pub recipients: Option<FileBlob>,
    /// Optional attachment
    pub attachment: Option<FileBlob>,
    /// Message subject
    pub subject: String,
    /// Message body
    pub body: BodyContent,
    /// Delay between messages in seconds
    pub delay_secs: u32,
}

impl SendJobRequest {
    /// Start building a request
    pub fn builder() -> SendJobRequestBuilder {
        SendJobRequestBuilder::default()
    }

    /// Check the request against the configured limits
    ///
    /// Checks run in the order a user would fix them: recipients first, then the
    /// attachment, then the delay. The recipients file is only checked for
    /// presence; its contents are parsed by the server.
    pub fn validate(&self, config: &Config) -> Result<(), ValidationError> {
        if self.recipients.is_none() {
            return Err(ValidationError::MissingRecipients);
        }

        if let Some(attachment) = &self.attachment {
            if attachment.size() > config.max_attachment_bytes {
                return Err(ValidationError::AttachmentTooLarge {
                    size: attachment.size(),
                    limit: config.max_attachment_bytes,
                });
            }
        }

        if !(config.min_delay_secs..=config.max_delay_secs).contains(&self.delay_secs) {
            return Err(ValidationError::DelayOutOfRange {
                delay: self.delay_secs,
                min: config.min_delay_secs,
                max: config.max_delay_secs,
            });
        }

        Ok(())
    }
}

/// Builder for [`SendJobRequest`]
#[derive(Clone, Debug)]
pub struct SendJobRequestBuilder {
    recipients: Option<FileBlob>,
    attachment: Option<FileBlob>,
    subject: String,
    body: BodyContent,
    delay_secs: u32,
}

impl Default for SendJobRequestBuilder {
    fn default() -> Self {
        Self {
            recipients: None,
            attachment: None,
            subject: String::new(),
            body: BodyContent::default(),
            delay_secs: 5,
        }
    }
}

impl SendJobRequestBuilder {
    /// Set the recipients spreadsheet
    pub fn recipients(mut self, file: FileBlob) -> Self {
        self.recipients = Some(file);
        self
    }

    /// Set the attachment
    pub fn attachment(mut self, file: FileBlob) -> Self {
        self.attachment = Some(file);
        self
    }

    /// Set the subject
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Use a plain-text body
    pub fn body_text(mut self, text: impl Into<String>) -> Self {
        self.body = BodyContent::Text(text.into());
        self
    }

    /// Use an HTML body
    pub fn body_html(mut self, html: impl Into<String>) -> Self {
        self.body = BodyContent::Html(html.into());
        self
    }

    /// Set the delay between messages in seconds
    pub fn delay_secs(mut self, delay: u32) -> Self {
        self.delay_secs = delay;
        self
    }

    /// Finish the request
    pub fn build(self) -> SendJobRequest {
        SendJobRequest {
            recipients: self.recipients,
            attachment: self.attachment,
            subject: self.subject,
            body: self.body,
            delay_secs: self.delay_secs,
        }
    }
}

/// Mutable composer form state
///
/// Holds what the user has entered so far. [`ComposerDraft::select_attachment`]
/// applies the size limit at selection time, so an oversized file never makes
/// it into the draft.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposerDraft {
    /// Selected recipients spreadsheet
    pub recipients: Option<FileBlob>,
    /// Selected attachment
    pub attachment: Option<FileBlob>,
    /// Subject line
    pub subject: String,
    /// Body content
    pub body: BodyContent,
    /// Delay between messages in seconds
    pub delay_secs: u32,
    /// Message from the last rejected file selection
    pub file_error: Option<String>,
}

impl ComposerDraft {
    /// Fresh draft using the configured defaults
    pub fn new(config: &Config) -> Self {
        Self {
            recipients: None,
            attachment: None,
            subject: config.default_subject.clone(),
            body: BodyContent::default(),
            delay_secs: config.default_delay_secs,
            file_error: None,
        }
    }

    /// Select an attachment, rejecting it if it exceeds the configured limit
    pub fn select_attachment(
        &mut self,
        file: Option<FileBlob>,
        config: &Config,
    ) -> Result<(), ValidationError> {
        match file {
            Some(file) if file.size() > config.max_attachment_bytes => {
                let err = ValidationError::AttachmentTooLarge {
                    size: file.size(),
                    limit: config.max_attachment_bytes,
                };
                self.file_error = Some(err.to_string());
                self.attachment = None;
                Err(err)
            }
            file => {
                self.file_error = None;
                self.attachment = file;
                Ok(())
            }
        }
    }

    /// Set the delay, clamped to the configured range
    pub fn set_delay(&mut self, delay: u32, config: &Config) {
        self.delay_secs = delay.clamp(config.min_delay_secs, config.max_delay_secs);
    }

    /// Reset every field to its cleared state
    ///
    /// Unlike [`ComposerDraft::new`], the subject is emptied rather than
    /// restored to the default.
    pub fn clear(&mut self, config: &Config) {
        *self = Self {
            subject: String::new(),
            ..Self::new(config)
        };
    }

    /// Snapshot the draft into a request
    pub fn to_request(&self) -> SendJobRequest {
        SendJobRequest {
            recipients: self.recipients.clone(),
            attachment: self.attachment.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            delay_secs: self.delay_secs,
        }
    }
}
