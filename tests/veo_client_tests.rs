//! Mock HTTP tests for VeoClient.
//!
//! These tests cover:
//! - Submission request formatting
//! - Error classification by status code
//! - Operation status parsing
//! - Video download

use living_portrait::cloud::{
    ArtifactRef, GenerationRequest, ImagePayload, OperationHandle, ServiceErrorKind, VeoClient,
    VideoService, DEFAULT_MODEL,
};
use living_portrait::postprocess::AspectRatio;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUBMIT_PATH: &str = "/v1beta/models/veo-3.1-generate-preview:predictLongRunning";

fn client(server: &MockServer) -> VeoClient {
    VeoClient::with_base_url("test-api-key".to_string(), server.uri()).unwrap()
}

fn request() -> GenerationRequest {
    GenerationRequest {
        prompt: "the woman smiles at the camera".to_string(),
        image: ImagePayload {
            bytes: vec![1, 2, 3],
            mime_type: "image/png",
        },
        aspect_ratio: AspectRatio::Landscape16x9,
        resolution: "720p".to_string(),
    }
}

// === Submission Tests ===

#[tokio::test]
async fn test_submit_sends_key_header_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .and(header("x-goog-api-key", "test-api-key"))
        .and(body_json(serde_json::json!({
            "instances": [{
                "prompt": "the woman smiles at the camera",
                "referenceImages": [{
                    "image": {"bytesBase64Encoded": "AQID", "mimeType": "image/png"},
                    "referenceType": "asset"
                }]
            }],
            "parameters": {"aspectRatio": "16:9", "resolution": "720p"}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"name": "models/veo/operations/op-1"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let handle = client(&mock_server).submit(&request()).await.unwrap();
    assert_eq!(handle.name, "models/veo/operations/op-1");
}

#[tokio::test]
async fn test_submit_uses_configured_model() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/veo-2.0-generate-001:predictLongRunning"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "operations/x"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = VeoClient::build(
        "test-api-key".to_string(),
        mock_server.uri(),
        "veo-2.0-generate-001".to_string(),
    )
    .unwrap();
    assert_ne!(client.model(), DEFAULT_MODEL);
    assert!(client.submit(&request()).await.is_ok());
}

#[tokio::test]
async fn test_submit_503_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("model overloaded"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).submit(&request()).await.unwrap_err();
    assert_eq!(err.kind, ServiceErrorKind::Transient);
    assert_eq!(err.status, Some(503));
    assert!(err.message.contains("model overloaded"));
}

#[tokio::test]
async fn test_submit_429_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).submit(&request()).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_submit_403_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).submit(&request()).await.unwrap_err();
    assert_eq!(err.kind, ServiceErrorKind::Fatal);
    assert_eq!(err.status, Some(403));
}

#[tokio::test]
async fn test_submit_malformed_response_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).submit(&request()).await.unwrap_err();
    assert_eq!(err.kind, ServiceErrorKind::Fatal);
}

// === Status Tests ===

#[tokio::test]
async fn test_fetch_status_pending() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models/veo/operations/op-1"))
        .and(header("x-goog-api-key", "test-api-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"name": "models/veo/operations/op-1"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let op = client(&mock_server)
        .fetch_status(&OperationHandle::new("models/veo/operations/op-1"))
        .await
        .unwrap();
    assert!(!op.done);
    assert!(op.error.is_none());
    assert!(op.result.is_none());
}

#[tokio::test]
async fn test_fetch_status_done_with_video() {
    let mock_server = MockServer::start().await;
    let video_uri = format!("{}/files/video.mp4", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/v1beta/operations/op-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "operations/op-2",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [{"video": {"uri": video_uri}}]
                }
            }
        })))
        .mount(&mock_server)
        .await;

    let op = client(&mock_server)
        .fetch_status(&OperationHandle::new("operations/op-2"))
        .await
        .unwrap();
    assert!(op.done);
    assert_eq!(op.result.unwrap().uri, video_uri);
}

#[tokio::test]
async fn test_fetch_status_done_with_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1beta/operations/op-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "operations/op-3",
            "done": true,
            "error": {"code": 3, "message": "Prompt rejected by safety filter"}
        })))
        .mount(&mock_server)
        .await;

    let op = client(&mock_server)
        .fetch_status(&OperationHandle::new("operations/op-3"))
        .await
        .unwrap();
    assert!(op.done);
    assert_eq!(
        op.error.as_deref(),
        Some("Prompt rejected by safety filter (code 3)")
    );
    assert!(op.result.is_none());
}

#[tokio::test]
async fn test_fetch_status_done_without_samples() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1beta/operations/op-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "operations/op-4",
            "done": true,
            "response": {"generateVideoResponse": {"raiMediaFilteredCount": 1}}
        })))
        .mount(&mock_server)
        .await;

    let op = client(&mock_server)
        .fetch_status(&OperationHandle::new("operations/op-4"))
        .await
        .unwrap();
    assert!(op.done);
    assert!(op.error.is_none());
    assert!(op.result.is_none());
}

#[tokio::test]
async fn test_fetch_status_server_error_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1beta/operations/op-5"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .fetch_status(&OperationHandle::new("operations/op-5"))
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

// === Download Tests ===

#[tokio::test]
async fn test_download_streams_to_file() {
    let mock_server = MockServer::start().await;
    let body: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();

    Mock::given(method("GET"))
        .and(path("/files/video.mp4"))
        .and(header("x-goog-api-key", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("output").join("video.mp4");
    let artifact = ArtifactRef {
        uri: format!("{}/files/video.mp4", mock_server.uri()),
    };

    let path = client(&mock_server).download(&artifact, &dest).await.unwrap();
    assert_eq!(path, dest);
    assert_eq!(std::fs::read(&dest).unwrap(), body);

    let leftovers: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("video.mp4")]);
}

#[tokio::test]
async fn test_download_not_found_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/missing.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let artifact = ArtifactRef {
        uri: format!("{}/files/missing.mp4", mock_server.uri()),
    };

    let err = client(&mock_server)
        .download(&artifact, &dir.path().join("video.mp4"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ServiceErrorKind::Fatal);
    assert_eq!(err.status, Some(404));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_failed_write_leaves_no_video_at_destination() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("video.mp4");
    // A directory in the way of the in-progress file makes the write fail
    std::fs::create_dir(dir.path().join("video.mp4.part")).unwrap();
    let artifact = ArtifactRef {
        uri: format!("{}/files/video.mp4", mock_server.uri()),
    };

    let result = client(&mock_server).download(&artifact, &dest).await;
    assert!(result.is_err());
    assert!(!dest.exists());
}
