// Defaults loaded from the environment (after dotenvy has read .env) and the
// explicit client configuration built from them at startup.

use std::env;

use crate::api::Endpoints;
use crate::form::Capabilities;

pub const LOCAL_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

// Use lazy_static to initialize static variables safely.
lazy_static::lazy_static! {
    pub static ref API_BASE: String = env::var("CHATFORM_API_BASE").unwrap_or_else(|_| LOCAL_API_BASE.to_string());
    pub static ref CHAT_MODEL: String = env::var("CHATFORM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    pub static ref OPENAI_API_KEY: String = env::var("OPENAI_API_KEY").unwrap_or_default();
}

/// Everything a `ChatForm` needs to know about its deployment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    pub capabilities: Capabilities,
    pub default_model: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            endpoints: Endpoints::new(base_url),
            capabilities,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Configuration from `CHATFORM_API_BASE` / `CHATFORM_MODEL`, PDF variant.
    pub fn from_env() -> Self {
        Self {
            endpoints: Endpoints::new(API_BASE.as_str()),
            capabilities: Capabilities::pdf_gated(),
            default_model: CHAT_MODEL.clone(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_model() {
        let config = ClientConfig::new("http://example.test", Capabilities::plain());
        assert_eq!(config.default_model, "gpt-4.1-mini");
        assert_eq!(config.endpoints.chat_url(), "http://example.test/api/chat");
        assert!(config.capabilities.requires_api_key);
    }

    #[test]
    fn test_with_model_overrides_default() {
        let config = ClientConfig::new("http://example.test", Capabilities::pdf()).with_model("gpt-4o");
        assert_eq!(config.default_model, "gpt-4o");
    }
}
