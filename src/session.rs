use futures::StreamExt;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::ChatError;
use crate::form::{Capabilities, FormState};
use crate::renderer::ResponseRenderer;
use crate::submit::{SnapshotStream, SubmissionController};
use crate::upload::{PdfFile, UploadController, UploadOutcome, UploadState};

/// The chat form: field state, the two controllers, and what the user sees
/// (streamed response, loading flag, error message).
pub struct ChatForm {
    form: FormState,
    capabilities: Capabilities,
    uploads: UploadController,
    submitter: SubmissionController,
    response: String,
    error: Option<String>,
    loading: bool,
}

impl ChatForm {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &ClientConfig) -> Self {
        Self {
            form: FormState::new(config.default_model.clone()),
            capabilities: config.capabilities,
            uploads: UploadController::new(client.clone(), config.endpoints.clone()),
            submitter: SubmissionController::new(client, config.endpoints.clone()),
            response: String::new(),
            error: None,
            loading: false,
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn upload_state(&self) -> &UploadState {
        self.uploads.state()
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn select_file(&mut self, file: PdfFile) {
        self.uploads.select_file(file);
    }

    pub fn clear_file(&mut self) {
        self.uploads.clear_file();
    }

    pub async fn upload(&mut self) -> Result<UploadOutcome, ChatError> {
        self.error = None;
        let result = self.uploads.upload().await;
        match &result {
            Ok(outcome) => self.follow_upload(outcome),
            Err(e) => self.error = Some(e.to_string()),
        }
        result
    }

    /// Keeps the selection pointing at a document the server knows about,
    /// preferring the one that was just uploaded.
    fn follow_upload(&mut self, outcome: &UploadOutcome) {
        let current_ok = self
            .form
            .selected_filename
            .as_ref()
            .is_some_and(|name| outcome.uploaded_filenames.contains(name));
        if current_ok {
            return;
        }
        self.form.selected_filename = outcome
            .filename
            .clone()
            .filter(|name| outcome.uploaded_filenames.contains(name));
    }

    /// Submits the form and streams the answer into `renderer`. Returns the
    /// final response text.
    pub async fn send<R>(&mut self, renderer: &mut R) -> Result<String, ChatError>
    where
        R: ResponseRenderer + ?Sized,
    {
        renderer.render("");
        let mut snapshots = self.start().await?;

        let mut last = String::new();
        let result = loop {
            match snapshots.next().await {
                Some(Ok(snapshot)) => {
                    renderer.render(&snapshot);
                    self.response.clone_from(&snapshot);
                    last = snapshot;
                    if let Some(reason) = renderer.failure() {
                        break Err(ChatError::Output(reason));
                    }
                }
                Some(Err(e)) => break Err(e),
                None => break Ok(last),
            }
        };
        self.finish(result)
    }

    /// Gates and opens the chat request, leaving the form loading with an
    /// empty response. A refusal or rejection is recorded and returned
    /// before any response text exists.
    pub async fn start(&mut self) -> Result<SnapshotStream, ChatError> {
        self.error = None;
        self.loading = true;
        self.response.clear();

        let result = self
            .submitter
            .submit(&self.form, self.uploads.state(), &self.capabilities)
            .await;
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    /// Records how a stream opened by [`ChatForm::start`] ended.
    pub fn finish(&mut self, result: Result<String, ChatError>) -> Result<String, ChatError> {
        match &result {
            Ok(text) => {
                self.loading = false;
                self.response.clone_from(text);
                info!(bytes = text.len(), "Chat response complete");
            }
            Err(e) => self.fail(e),
        }
        result
    }

    fn fail(&mut self, err: &ChatError) {
        warn!(error = %err, "Chat submission failed");
        self.loading = false;
        self.error = Some(err.to_string());
    }

    /// Uploads the selected file first when it has not been uploaded yet,
    /// waits for the result, and only sends when that succeeded.
    pub async fn upload_and_send<R>(&mut self, renderer: &mut R) -> Result<String, ChatError>
    where
        R: ResponseRenderer + ?Sized,
    {
        let state = self.uploads.state();
        if self.capabilities.supports_upload && state.has_file() && !state.is_uploaded() {
            self.upload().await?;
        }
        self.send(renderer).await
    }
}
