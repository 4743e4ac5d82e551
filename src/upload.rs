use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::analytics::WordCount;
use crate::api::{Endpoints, UploadResponse};
use crate::error::ChatError;

const GENERIC_UPLOAD_FAILURE: &str = "Upload failed";

/// A PDF picked by the user, held in memory until it is uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct PdfFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PdfFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl PdfFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ChatError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ChatError::InvalidFile(format!("{} is not a file", path.display())))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ChatError::InvalidFile(format!("Cannot read {}: {}", path.display(), e)))?;
        Ok(Self::new(name, bytes))
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if !self.name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(ChatError::InvalidFile("Only PDF files are allowed.".to_string()));
        }
        if self.bytes.is_empty() {
            return Err(ChatError::InvalidFile("File is empty.".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Success,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct UploadState {
    pub file: Option<PdfFile>,
    pub status: UploadStatus,
    pub uploaded_filenames: Vec<String>,
    pub analytics: Option<Vec<WordCount>>,
}

impl UploadState {
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_uploaded(&self) -> bool {
        self.status == UploadStatus::Success
    }
}

/// What a successful upload hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub filename: Option<String>,
    pub message: Option<String>,
    pub uploaded_filenames: Vec<String>,
    pub analytics: Option<Vec<WordCount>>,
}

pub struct UploadController {
    client: Client,
    endpoints: Endpoints,
    state: UploadState,
}

impl UploadController {
    pub fn new(client: Client, endpoints: Endpoints) -> Self {
        Self {
            client,
            endpoints,
            state: UploadState::default(),
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// A new selection always starts over: whatever the previous file's
    /// upload did, the new one has not been uploaded yet.
    pub fn select_file(&mut self, file: PdfFile) {
        debug!(?file, "File selected");
        self.state.file = Some(file);
        self.state.status = UploadStatus::Idle;
    }

    pub fn clear_file(&mut self) {
        self.state.file = None;
        self.state.status = UploadStatus::Idle;
    }

    #[instrument(skip(self), fields(url = %self.endpoints.upload_url()))]
    pub async fn upload(&mut self) -> Result<UploadOutcome, ChatError> {
        let file = self
            .state
            .file
            .clone()
            .ok_or_else(|| ChatError::InvalidFile("No file selected.".to_string()))?;
        file.validate()?;

        self.state.status = UploadStatus::Uploading;
        match self.send(&file).await {
            Ok(response) => {
                let uploaded_filenames = response
                    .uploaded_filenames
                    .or_else(|| response.filename.clone().map(|f| vec![f]))
                    .unwrap_or_default();
                info!(file = %file.name, documents = uploaded_filenames.len(), "Upload succeeded");

                self.state.status = UploadStatus::Success;
                self.state.uploaded_filenames = uploaded_filenames.clone();
                self.state.analytics = response.analytics.clone();

                Ok(UploadOutcome {
                    filename: response.filename,
                    message: response.message,
                    uploaded_filenames,
                    analytics: response.analytics,
                })
            }
            Err(e) => {
                warn!(file = %file.name, error = %e, "Upload failed");
                self.state.status = UploadStatus::Failed;
                Err(e)
            }
        }
    }

    async fn send(&self, file: &PdfFile) -> Result<UploadResponse, ChatError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str("application/pdf")
            .map_err(|e| ChatError::Unknown(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoints.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let parsed: UploadResponse = serde_json::from_str(&body).map_err(|e| {
            error!(%status, %body, "Upload response is not JSON");
            ChatError::MalformedResponse(e.to_string())
        })?;

        if !status.is_success() {
            let detail = parsed
                .detail
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| GENERIC_UPLOAD_FAILURE.to_string());
            return Err(ChatError::UploadFailed(detail));
        }
        Ok(parsed)
    }
}
