use thiserror::Error;

/// Every way a chat submission or an upload can end without success.
///
/// All variants are terminal for the action that produced them; nothing is
/// retried. `Display` is the message shown to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Please upload the selected PDF before sending a message.")]
    UploadRequired,

    #[error("Please select an uploaded PDF to chat with.")]
    SelectionRequired,

    #[error("{0} is required.")]
    MissingField(&'static str),

    #[error("{0}")]
    InvalidFile(String),

    #[error("Server returned an invalid response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    UploadFailed(String),

    #[error("{0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Cannot write response: {0}")]
    Output(String),

    #[error("{0}")]
    Unknown(String),
}

impl ChatError {
    /// True for the checks that run before any request is issued.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ChatError::UploadRequired
                | ChatError::SelectionRequired
                | ChatError::MissingField(_)
                | ChatError::InvalidFile(_)
        )
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() || err.is_decode() {
            ChatError::Network(err.to_string())
        } else {
            ChatError::Unknown(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_failed_is_verbatim() {
        let err = ChatError::UploadFailed("File too large".to_string());
        assert_eq!(err.to_string(), "File too large");
    }

    #[test]
    fn test_precondition_classification() {
        assert!(ChatError::UploadRequired.is_precondition());
        assert!(ChatError::MissingField("User message").is_precondition());
        assert!(!ChatError::Network("reset".into()).is_precondition());
        assert!(!ChatError::MalformedResponse("oops".into()).is_precondition());
    }
}
