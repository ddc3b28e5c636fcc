//! API integration tests against the in-memory execution facility.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use parallax_api::{create_router, ApiConfig, AppState};
use parallax_models::{JobId, JobRecord, JobState};
use parallax_queue::{JobBroker, MemoryBroker, MemoryStatusStore, StatusStore};

const BOUNDARY: &str = "parallax-test-boundary";

struct TestApp {
    _dir: tempfile::TempDir,
    router: Router,
    broker: Arc<MemoryBroker>,
    store: Arc<MemoryStatusStore>,
    config: ApiConfig,
}

fn test_app_with(configure: impl FnOnce(&mut ApiConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ApiConfig {
        upload_dir: dir.path().join("temp"),
        output_dir: dir.path().join("static"),
        ..ApiConfig::default()
    };
    configure(&mut config);

    let broker = Arc::new(MemoryBroker::new());
    let store = Arc::new(MemoryStatusStore::new());
    let state = AppState::new(config.clone(), broker.clone(), store.clone());

    TestApp {
        _dir: dir,
        router: create_router(state, None),
        broker,
        store,
        config,
    }
}

fn test_app() -> TestApp {
    test_app_with(|_| {})
}

/// Part of a multipart form.
enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

fn image(content_type: &str) -> Part<'_> {
    Part::File {
        name: "image",
        file_name: "photo.jpg",
        content_type,
        bytes: b"\xff\xd8\xff\xe0fake-jpeg",
    }
}

fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                let disposition =
                    format!("form-data; name=\"{name}\"; filename=\"{file_name}\"");
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: {disposition}\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/create_video")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_reports_broker() {
    let app = test_app();
    let (status, body) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["broker"]["status"], "ok");
}

#[tokio::test]
async fn test_create_video_accepts_and_enqueues() {
    let app = test_app();
    let request = multipart_request(&[
        image("image/jpeg"),
        Part::Text("duration", "5"),
        Part::Text("zoomEnabled", "true"),
        Part::Text("zoomIntensity", "2.0"),
        Part::Text("zoomReverse", "false"),
        Part::Text("zoomCumulative", "true"),
        Part::Text("zoomSmooth", "false"),
    ]);

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");

    let task_id = body["task_id"].as_str().unwrap().to_string();
    let job_id = JobId::from_string(task_id.clone());

    let record = app.store.get(&job_id).await.unwrap().unwrap();
    assert_eq!(record.state, JobState::Pending);
    assert_eq!(
        record.output_path,
        app.config.output_dir.join(format!("output_{task_id}.mp4"))
    );

    let batch = app.broker.consume("test", 0, 10).await.unwrap();
    assert_eq!(batch.len(), 1);
    let job = &batch[0].1;
    assert_eq!(job.job_id, job_id);
    assert_eq!(job.spec.defaults.duration, 5);
    assert_eq!(job.spec.defaults.framerate, 60);
    assert!(job.spec.animations.zoom.is_some());
    assert!(job.spec.animations.circle.is_none());
    assert!(job.spec.image_path.starts_with(&app.config.upload_dir));
    assert!(job.spec.image_path.exists());
}

#[tokio::test]
async fn test_missing_image_is_rejected() {
    let app = test_app();
    let (status, body) = send(&app, multipart_request(&[Part::Text("duration", "5")])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image provided");
    assert_eq!(app.broker.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_non_image_upload_is_rejected() {
    let app = test_app();
    let (status, body) = send(&app, multipart_request(&[image("text/plain")])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid file format: text/plain");
    assert_eq!(app.broker.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_file_name_is_rejected() {
    let app = test_app();
    let request = multipart_request(&[Part::File {
        name: "image",
        file_name: "",
        content_type: "image/png",
        bytes: b"png",
    }]);
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image selected");
}

#[tokio::test]
async fn test_enabled_effect_with_missing_field_creates_no_job() {
    let app = test_app();
    let request = multipart_request(&[
        image("image/png"),
        Part::Text("circleEnabled", "on"),
        Part::Text("circleIntensity", "1"),
    ]);
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("circle"), "{body}");
    assert_eq!(app.broker.len().await.unwrap(), 0);
    let uploads = &app.config.upload_dir;
    assert!(!uploads.exists() || std::fs::read_dir(uploads).unwrap().next().is_none());
}

#[tokio::test]
async fn test_fresh_job_polls_pending() {
    let app = test_app();
    let (_, body) = send(&app, multipart_request(&[image("image/jpeg")])).await;
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, get(&format!("/api/task_status/{task_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "PENDING");
    assert_eq!(body["status"], "Pending...");
}

#[tokio::test]
async fn test_poll_reports_terminal_states() {
    let app = test_app();

    let mut ok = JobRecord::pending(JobId::new(), "static/output_ok.mp4");
    ok.start().unwrap();
    ok.succeed().unwrap();
    app.store.put(&ok).await.unwrap();

    let mut bad = JobRecord::pending(JobId::new(), "static/output_bad.mp4");
    bad.start().unwrap();
    bad.fail("depthflow exited with status 1").unwrap();
    app.store.put(&bad).await.unwrap();

    let (status, body) = send(&app, get(&format!("/api/task_status/{}", ok.job_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "SUCCEEDED");
    assert_eq!(body["status"], "static/output_ok.mp4");

    let (_, body) = send(&app, get(&format!("/api/task_status/{}", bad.job_id))).await;
    assert_eq!(body["state"], "FAILED");
    assert_eq!(body["status"], "depthflow exited with status 1");
}

#[tokio::test]
async fn test_running_job_reports_liveness() {
    let app = test_app();
    let mut record = JobRecord::pending(JobId::new(), "static/output_run.mp4");
    record.start().unwrap();
    app.store.put(&record).await.unwrap();

    let (_, body) = send(&app, get(&format!("/api/task_status/{}", record.job_id))).await;
    assert_eq!(body["state"], "RUNNING");
    assert_eq!(body["status"], "Rendering...");
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let app = test_app();
    let id = JobId::new();
    let (status, body) = send(&app, get(&format!("/api/task_status/{id}"))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], format!("Unknown task id: {id}"));
}

#[tokio::test]
async fn test_unknown_task_legacy_pending() {
    let app = test_app_with(|config| config.legacy_unknown_as_pending = true);
    let (status, body) = send(&app, get(&format!("/api/task_status/{}", JobId::new()))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "PENDING");
    assert_eq!(body["status"], "Pending...");
}

#[tokio::test]
async fn test_malformed_task_id_is_bad_request() {
    let app = test_app();
    let (status, _) = send(&app, get("/api/task_status/short")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-ID", "req-12345")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["X-Request-ID"], "req-12345");
}
