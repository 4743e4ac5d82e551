use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use futures::channel::mpsc;
use futures::StreamExt;
use minijinja::Environment;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::analytics::cloud_weights;
use crate::api::UploadResponse;
use crate::config::ClientConfig;
use crate::error::ChatError;
use crate::session::ChatForm;
use crate::submit::SnapshotStream;
use crate::upload::PdfFile;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<Environment<'static>>,
    chat: Arc<Mutex<ChatForm>>,
}

impl AppState {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            templates: Arc::new(create_minijinja_env().context("Failed to initialize template engine")?),
            chat: Arc::new(Mutex::new(ChatForm::new(config))),
        })
    }

    pub fn with_chat(chat: ChatForm) -> Result<Self> {
        Ok(Self {
            templates: Arc::new(create_minijinja_env().context("Failed to initialize template engine")?),
            chat: Arc::new(Mutex::new(chat)),
        })
    }
}

/// Fields posted by the browser form to `/api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatInput {
    pub developer_message: String,
    pub user_message: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub pdf_filename: Option<String>,
}

fn create_minijinja_env() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.add_template("index.html", include_str!("../templates/index.html"))?;
    Ok(env)
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

fn error_status(err: &ChatError) -> StatusCode {
    match err {
        e if e.is_precondition() => StatusCode::BAD_REQUEST,
        ChatError::UploadFailed(_) | ChatError::RequestFailed(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, Html<String>> {
    let chat = state.chat.lock().await;
    let upload = chat.upload_state();
    let analytics = upload.analytics.clone().unwrap_or_default();

    state
        .templates
        .get_template("index.html")
        .and_then(|tmpl| {
            let context = minijinja::context! {
                title => "PDF Chat",
                caps => chat.capabilities(),
                model => chat.form().effective_model(),
                uploaded_filenames => &upload.uploaded_filenames,
                selected_filename => &chat.form().selected_filename,
                analytics => &analytics,
                cloud => cloud_weights(&analytics),
                upload_required => ChatError::UploadRequired.to_string(),
            };
            tmpl.render(context)
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            Html(format!("Internal Server Error: {}", e))
        })
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Opens the backend request before answering, so a refusal or a backend
/// rejection reaches the browser as a status plus `detail`. The form lock
/// is held only while the request is opened; concurrent submissions share
/// one form and the last one to finish owns the stored response.
async fn chat_handler(State(state): State<AppState>, Json(input): Json<ChatInput>) -> Response {
    let snapshots = {
        let mut chat = state.chat.lock().await;
        let form = chat.form_mut();
        form.developer_message = input.developer_message;
        form.user_message = input.user_message;
        form.model = input.model;
        form.api_key = input.api_key;
        if input.pdf_filename.is_some() {
            form.selected_filename = input.pdf_filename;
        }
        match chat.start().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                info!(error = %e, "Chat submission refused");
                return detail(error_status(&e), e.to_string());
            }
        }
    };

    let (tx, rx) = mpsc::unbounded::<std::result::Result<Bytes, std::io::Error>>();
    let chat = state.chat.clone();
    tokio::spawn(async move {
        let result = forward_deltas(snapshots, &tx).await;
        if let Err(e) = &result {
            warn!(error = %e, "Streaming to browser ended with an error");
            let _ = tx.unbounded_send(Err(std::io::Error::other(e.to_string())));
        }
        let _ = chat.lock().await.finish(result);
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(rx))
        .unwrap_or_else(|e| detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Sends only the part of each snapshot the browser has not seen yet.
async fn forward_deltas(
    mut snapshots: SnapshotStream,
    tx: &mpsc::UnboundedSender<std::result::Result<Bytes, std::io::Error>>,
) -> std::result::Result<String, ChatError> {
    let mut last = String::new();
    while let Some(snapshot) = snapshots.next().await {
        let snapshot = snapshot?;
        if snapshot.len() > last.len() && snapshot.is_char_boundary(last.len()) {
            let delta = Bytes::copy_from_slice(snapshot[last.len()..].as_bytes());
            if tx.unbounded_send(Ok(delta)).is_err() {
                return Err(ChatError::Output("browser disconnected".to_string()));
            }
        }
        last = snapshot;
    }
    Ok(last)
}

async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some(PdfFile::new(name, bytes.to_vec())),
                    Err(e) => return detail(StatusCode::BAD_REQUEST, e.to_string()),
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return detail(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }
    let Some(file) = file else {
        return detail(StatusCode::BAD_REQUEST, "No file uploaded.");
    };

    let mut chat = state.chat.lock().await;
    chat.select_file(file);
    match chat.upload().await {
        Ok(outcome) => Json(UploadResponse {
            detail: None,
            filename: outcome.filename,
            message: outcome.message,
            uploaded_filenames: Some(outcome.uploaded_filenames),
            analytics: outcome.analytics,
        })
        .into_response(),
        Err(e) => detail(error_status(&e), e.to_string()),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/upload_pdf", post(upload_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(port: u16, config: ClientConfig) -> Result<()> {
    let state = AppState::new(&config)?;
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!(backend = %config.endpoints.base(), "Web UI listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
