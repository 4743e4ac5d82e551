use chatform::analytics::WordCount;
use chatform::api::Endpoints;
use chatform::upload::{PdfFile, UploadController, UploadStatus};
use chatform::ChatError;
use serde_json::json;
use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn controller(server: &MockServer) -> UploadController {
    UploadController::new(reqwest::Client::new(), Endpoints::new(server.uri()))
}

fn pdf(name: &str) -> PdfFile {
    PdfFile::new(name, b"%PDF-1.4 test".to_vec())
}

#[test_log::test(tokio::test)]
async fn test_successful_upload_replaces_filenames_and_analytics() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_pdf"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "filename": "second.pdf",
            "message": "PDF uploaded and indexed successfully.",
            "uploaded_filenames": ["first.pdf", "second.pdf"],
            "analytics": [{"word": "rust", "count": 12}, {"word": "memory", "count": 7}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut uploads = controller(&server);
    uploads.select_file(pdf("second.pdf"));
    let outcome = uploads.upload().await.unwrap();

    assert_eq!(outcome.filename.as_deref(), Some("second.pdf"));
    let state = uploads.state();
    assert_eq!(state.status, UploadStatus::Success);
    assert_eq!(state.uploaded_filenames, vec!["first.pdf", "second.pdf"]);
    assert_eq!(
        state.analytics,
        Some(vec![WordCount::new("rust", 12), WordCount::new("memory", 7)])
    );
}

#[tokio::test]
async fn test_second_upload_replaces_list_wholesale() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "filename": "a.pdf",
            "uploaded_filenames": ["a.pdf", "b.pdf"],
            "analytics": [{"word": "alpha", "count": 3}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload_pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "filename": "c.pdf",
            "uploaded_filenames": ["c.pdf"]
        })))
        .mount(&server)
        .await;

    let mut uploads = controller(&server);
    uploads.select_file(pdf("a.pdf"));
    uploads.upload().await.unwrap();
    uploads.select_file(pdf("c.pdf"));
    uploads.upload().await.unwrap();

    assert_eq!(uploads.state().uploaded_filenames, vec!["c.pdf"]);
    assert_eq!(uploads.state().analytics, None);
}

#[tokio::test]
async fn test_missing_list_falls_back_to_filename() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"filename": "only.pdf"})))
        .mount(&server)
        .await;

    let mut uploads = controller(&server);
    uploads.select_file(pdf("only.pdf"));
    let outcome = uploads.upload().await.unwrap();
    assert_eq!(outcome.uploaded_filenames, vec!["only.pdf"]);
}

#[tokio::test]
async fn test_non_json_body_is_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_pdf"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let mut uploads = controller(&server);
    uploads.select_file(pdf("doc.pdf"));
    let err = uploads.upload().await.unwrap_err();

    assert!(matches!(err, ChatError::MalformedResponse(_)), "got {:?}", err);
    assert_eq!(uploads.state().status, UploadStatus::Failed);
    assert!(uploads.state().analytics.is_none());
}

#[tokio::test]
async fn test_non_json_body_with_ok_status_is_still_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy page</html>"))
        .mount(&server)
        .await;

    let mut uploads = controller(&server);
    uploads.select_file(pdf("doc.pdf"));
    assert!(matches!(
        uploads.upload().await,
        Err(ChatError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn test_error_detail_is_surfaced_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_pdf"))
        .respond_with(ResponseTemplate::new(413).set_body_json(json!({"detail": "File too large"})))
        .mount(&server)
        .await;

    let mut uploads = controller(&server);
    uploads.select_file(pdf("big.pdf"));
    let err = uploads.upload().await.unwrap_err();

    assert_eq!(err, ChatError::UploadFailed("File too large".to_string()));
    assert_eq!(err.to_string(), "File too large");
    assert_eq!(uploads.state().status, UploadStatus::Failed);
}

#[tokio::test]
async fn test_error_without_detail_uses_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_pdf"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({})))
        .mount(&server)
        .await;

    let mut uploads = controller(&server);
    uploads.select_file(pdf("doc.pdf"));
    assert_eq!(
        uploads.upload().await.unwrap_err(),
        ChatError::UploadFailed("Upload failed".to_string())
    );
}

#[tokio::test]
async fn test_invalid_file_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut uploads = controller(&server);
    uploads.select_file(PdfFile::new("image.png", b"\x89PNG".to_vec()));
    let err = uploads.upload().await.unwrap_err();
    assert_eq!(err, ChatError::InvalidFile("Only PDF files are allowed.".to_string()));
}

#[tokio::test]
async fn test_new_selection_after_success_resets_gate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "filename": "a.pdf",
            "uploaded_filenames": ["a.pdf"]
        })))
        .mount(&server)
        .await;

    let mut uploads = controller(&server);
    uploads.select_file(pdf("a.pdf"));
    uploads.upload().await.unwrap();
    assert!(uploads.state().is_uploaded());

    uploads.select_file(pdf("b.pdf"));
    assert_eq!(uploads.state().status, UploadStatus::Idle);
    assert!(!uploads.state().is_uploaded());
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let mut uploads = UploadController::new(reqwest::Client::new(), Endpoints::new("http://127.0.0.1:9"));
    uploads.select_file(pdf("doc.pdf"));
    assert!(matches!(uploads.upload().await, Err(ChatError::Network(_))));
    assert_eq!(uploads.state().status, UploadStatus::Failed);
}
