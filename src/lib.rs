pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod form;
pub mod renderer;
pub mod session;
pub mod submit;
pub mod upload;
pub mod web_server;

pub use config::ClientConfig;
pub use error::ChatError;
pub use form::{Capabilities, FormState};
pub use renderer::{ResponseRenderer, TerminalRenderer};
pub use session::ChatForm;
pub use upload::{PdfFile, UploadStatus};
