//! HTTP transport: multipart POST to `{base}/send-emails-stream`.

use super::{ChunkSource, Transport};
use crate::config::Config;
use crate::error::{Error, Result, ValidationError};
use crate::request::{FileBlob, SendJobRequest};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::multipart::{Form, Part};

/// Streams the send job over HTTP
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl HttpTransport {
    /// Create a transport for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL is invalid or the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config.send_endpoint()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {e}"),
                key: None,
            })?;

        Ok(Self { client, endpoint })
    }

    /// The URL requests are sent to
    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

/// Build the multipart body
///
/// Field names follow the API contract: `recipientsFile`, `attachmentFile`
/// (optional), `subject`, `bodyText` or `bodyHtml`, and `delay`.
pub(crate) fn build_form(request: &SendJobRequest) -> Result<Form> {
    let recipients = request
        .recipients
        .as_ref()
        .ok_or(ValidationError::MissingRecipients)?;

    let mut form = Form::new().part("recipientsFile", file_part(recipients)?);
    if let Some(attachment) = &request.attachment {
        form = form.part("attachmentFile", file_part(attachment)?);
    }

    Ok(form
        .text("subject", request.subject.clone())
        .text(request.body.field_name(), request.body.content().to_string())
        .text("delay", request.delay_secs.to_string()))
}

fn file_part(file: &FileBlob) -> Result<Part> {
    Ok(Part::bytes(file.bytes.clone())
        .file_name(file.name.clone())
        .mime_str(file.mime_type())?)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(
        &self,
        access_token: &str,
        request: &SendJobRequest,
    ) -> Result<Box<dyn ChunkSource>> {
        let form = build_form(request)?;

        tracing::debug!(endpoint = %self.endpoint, "Sending bulk mail request");
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(Error::MissingBody);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(Box::new(HttpChunkSource { stream }))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

struct HttpChunkSource {
    stream: BoxStream<'static, reqwest::Result<Vec<u8>>>,
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.stream.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(Error::Network(e)),
            None => Ok(None),
        }
    }
}
