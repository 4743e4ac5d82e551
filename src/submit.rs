use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use tracing::{debug, error, info, instrument};

use crate::api::{ChatRequest, Endpoints, ErrorDetail};
use crate::error::ChatError;
use crate::form::{Capabilities, FormState};
use crate::upload::UploadState;

/// Full response text so far, one item per received chunk.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Refuses a submission that would send a message about a document the
/// backend does not have yet. Runs before any request is built.
pub fn check_gate(form: &FormState, upload: &UploadState, caps: &Capabilities) -> Result<(), ChatError> {
    if caps.supports_upload {
        if upload.has_file() && !upload.is_uploaded() {
            return Err(ChatError::UploadRequired);
        }
        let selection_valid = form
            .selected_filename
            .as_ref()
            .map(|name| upload.uploaded_filenames.iter().any(|f| f == name));
        match selection_valid {
            Some(false) => return Err(ChatError::SelectionRequired),
            None if upload.has_file() => return Err(ChatError::SelectionRequired),
            _ => {}
        }
    }

    if form.developer_message.trim().is_empty() {
        return Err(ChatError::MissingField("Developer message"));
    }
    if form.user_message.trim().is_empty() {
        return Err(ChatError::MissingField("User message"));
    }
    if caps.requires_api_key && form.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
        return Err(ChatError::MissingField("API key"));
    }
    Ok(())
}

pub fn build_request(form: &FormState, caps: &Capabilities) -> ChatRequest {
    ChatRequest {
        developer_message: form.developer_message.clone(),
        user_message: form.user_message.clone(),
        model: form.effective_model().to_string(),
        api_key: if caps.requires_api_key {
            form.api_key.clone()
        } else {
            None
        },
        pdf_filename: if caps.supports_upload {
            // The backend requires the field in document mode and falls back
            // to plain chat for unknown names.
            Some(form.selected_filename.clone().unwrap_or_default())
        } else {
            None
        },
    }
}

/// Decodes chunks into one growing string. Multi-byte characters split
/// across chunks are held back until the rest of their bytes arrive.
#[derive(Debug, Default)]
pub struct SnapshotAccumulator {
    text: String,
    pending: Vec<u8>,
}

impl SnapshotAccumulator {
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    self.text.push_str(s);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.text
                        .push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        self.text.clone()
    }

    /// Flushes a truncated trailing character, if any. Returns the final
    /// snapshot only when that changed the text.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending.clear();
        self.text.push(char::REPLACEMENT_CHARACTER);
        Some(self.text.clone())
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Turns a stream of body chunks into a stream of full snapshots. Ends at
/// end-of-stream or after the first transport error.
pub fn snapshots<S, B, E>(chunks: S) -> impl Stream<Item = Result<String, ChatError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    stream::unfold(
        Some((Box::pin(chunks), SnapshotAccumulator::default())),
        |state| async move {
            let (mut chunks, mut acc) = match state {
                Some(state) => state,
                None => return None,
            };
            match chunks.next().await {
                Some(Ok(bytes)) => {
                    let snapshot = acc.push(bytes.as_ref());
                    Some((Ok(snapshot), Some((chunks, acc))))
                }
                Some(Err(e)) => Some((Err(ChatError::Network(e.to_string())), None)),
                None => acc.finish().map(|snapshot| (Ok(snapshot), None)),
            }
        },
    )
}

pub struct SubmissionController {
    client: Client,
    endpoints: Endpoints,
}

impl SubmissionController {
    pub fn new(client: Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    /// Checks the gate, then posts the form. Nothing goes over the wire when
    /// the gate refuses.
    pub async fn submit(
        &self,
        form: &FormState,
        upload: &UploadState,
        caps: &Capabilities,
    ) -> Result<SnapshotStream, ChatError> {
        check_gate(form, upload, caps)?;
        self.open(build_request(form, caps)).await
    }

    #[instrument(skip(self, request), fields(url = %self.endpoints.chat_url(), model = %request.model))]
    pub async fn open(&self, request: ChatRequest) -> Result<SnapshotStream, ChatError> {
        debug!(pdf = ?request.pdf_filename, "Sending chat request");
        let response = self
            .client
            .post(self.endpoints.chat_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "Chat request rejected");
            let detail = serde_json::from_str::<ErrorDetail>(&body)
                .ok()
                .and_then(|d| d.detail)
                .unwrap_or_else(|| format!("Chat request failed with status {}", status));
            return Err(ChatError::RequestFailed(detail));
        }

        info!(%status, "Streaming chat response");
        Ok(Box::pin(snapshots(response.bytes_stream())))
    }
}
