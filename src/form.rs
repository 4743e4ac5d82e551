use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MODEL;

/// Which parts of the form a deployment exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_upload: bool,
    pub supports_analytics: bool,
    pub requires_api_key: bool,
}

impl Capabilities {
    /// Plain chat: the caller supplies their own API key, no documents.
    pub fn plain() -> Self {
        Self {
            supports_upload: false,
            supports_analytics: false,
            requires_api_key: true,
        }
    }

    /// PDF-grounded chat without analytics.
    pub fn pdf() -> Self {
        Self {
            supports_upload: true,
            supports_analytics: false,
            requires_api_key: false,
        }
    }

    /// PDF-grounded chat with upload analytics.
    pub fn pdf_gated() -> Self {
        Self {
            supports_upload: true,
            supports_analytics: true,
            requires_api_key: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::pdf_gated()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub developer_message: String,
    pub user_message: String,
    pub model: String,
    pub api_key: Option<String>,
    pub selected_filename: Option<String>,
}

impl FormState {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// A blank model field falls back to the default model.
    pub fn effective_model(&self) -> &str {
        let model = self.model.trim();
        if model.is_empty() {
            DEFAULT_MODEL
        } else {
            model
        }
    }
}
