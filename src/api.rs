use serde::{Deserialize, Serialize};

use crate::analytics::WordCount;
use crate::config::LOCAL_API_BASE;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub developer_message: String,
    pub user_message: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_filename: Option<String>,
}

/// Body returned by `POST /api/upload_pdf`, both on success and on rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_filenames: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<Vec<WordCount>>,
}

/// Error body the chat endpoint sends alongside a non-2xx status.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub detail: Option<String>,
}

/// Resolved URLs of the two backend endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Local development hosts talk to the backend on its fixed port,
    /// everything else is same-origin.
    pub fn for_host(host: &str) -> Self {
        match host {
            "localhost" | "127.0.0.1" => Self::new(LOCAL_API_BASE),
            other => Self::new(format!("https://{}", other)),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base)
    }

    pub fn upload_url(&self) -> String {
        format!("{}/api/upload_pdf", self.base)
    }
}
