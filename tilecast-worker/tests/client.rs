use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use tilecast_core::{WireError, api_routes::work, stream::boxed, wire};
use tilecast_worker::{HttpJobClient, JobSource, PollOutcome, ResultSink, WorkerError};
use tokio::io::AsyncReadExt;

async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{addr}")
}

fn client(base: &str) -> HttpJobClient {
    HttpJobClient::new(base, Duration::from_secs(2)).expect("client")
}

#[tokio::test]
async fn not_modified_means_no_work() {
    let base = spawn_server(Router::new().route(
        work::JOBS,
        post(|| async { StatusCode::NOT_MODIFIED }),
    ))
    .await;

    let outcome = client(&base).poll().await.expect("poll");
    assert!(matches!(outcome, PollOutcome::NoWork));
}

#[tokio::test]
async fn ok_responses_decode_into_a_streaming_job() {
    let base = spawn_server(Router::new().route(
        work::JOBS,
        post(|| async {
            (
                [("x-tile", "v.mp4_0"), ("x-height", "640"), ("x-width", "720")],
                "raw tile bytes",
            )
        }),
    ))
    .await;

    let outcome = client(&base).poll().await.expect("poll");
    let PollOutcome::Job(mut job) = outcome else {
        panic!("expected a job, got {outcome:?}");
    };

    assert_eq!(job.tile_name(), "v.mp4_0");
    assert_eq!((job.header.width, job.header.height), (720, 640));

    let mut body = Vec::new();
    job.body.read_to_end(&mut body).await.expect("body");
    assert_eq!(body, b"raw tile bytes");
}

#[tokio::test]
async fn missing_tile_header_is_malformed() {
    let base = spawn_server(Router::new().route(
        work::JOBS,
        post(|| async { ([("x-height", "1"), ("x-width", "1")], "x") }),
    ))
    .await;

    let outcome = client(&base).poll().await;
    assert!(matches!(
        outcome,
        Err(WorkerError::Wire(WireError::MissingTileName))
    ));
}

#[tokio::test]
async fn unexpected_status_is_a_transient_rejection() {
    let base = spawn_server(Router::new().route(
        work::JOBS,
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    ))
    .await;

    let err = client(&base).poll().await.expect_err("rejected");
    assert!(matches!(err, WorkerError::Rejected(StatusCode::INTERNAL_SERVER_ERROR)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let err = client(&format!("http://{addr}"))
        .poll()
        .await
        .expect_err("connection refused");
    assert!(matches!(err, WorkerError::Transport(_)));
    assert!(err.is_transient());
}

type Uploads = Arc<Mutex<Vec<(String, String, Vec<u8>)>>>;

async fn capture_upload(
    State(uploads): State<Uploads>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    uploads.lock().expect("uploads lock").push((
        header("content-disposition"),
        header("content-type"),
        body.to_vec(),
    ));
    StatusCode::OK
}

#[tokio::test]
async fn results_are_uploaded_as_attachments() {
    let uploads = Uploads::default();
    let base = spawn_server(
        Router::new()
            .route(work::RESULT, post(capture_upload))
            .with_state(uploads.clone()),
    )
    .await;

    client(&base)
        .send_result("v.mp4_0", boxed(&b"encoded"[..]))
        .await
        .expect("uploaded");

    let uploads = uploads.lock().expect("uploads lock").clone();
    assert_eq!(
        uploads,
        vec![(
            "attachment; filename*=UTF-8''v.mp4_0".to_string(),
            "application/octet-stream".to_string(),
            b"encoded".to_vec(),
        )]
    );
}

#[tokio::test]
async fn upload_names_with_separators_and_non_ascii_survive() {
    let uploads = Uploads::default();
    let base = spawn_server(
        Router::new()
            .route(work::RESULT, post(capture_upload))
            .with_state(uploads.clone()),
    )
    .await;

    client(&base)
        .send_result("vidéo;1.mp4_0", boxed(&b"encoded"[..]))
        .await
        .expect("uploaded");

    let uploads = uploads.lock().expect("uploads lock").clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(
        wire::attachment_filename(&uploads[0].0).as_deref(),
        Some("vidéo;1.mp4_0")
    );
}

#[tokio::test]
async fn percent_encoded_tile_headers_are_decoded() {
    let base = spawn_server(Router::new().route(
        work::JOBS,
        post(|| async {
            (
                [("x-tile", "vid%C3%A9o.mp4_0"), ("x-height", "2"), ("x-width", "2")],
                "x",
            )
        }),
    ))
    .await;

    let outcome = client(&base).poll().await.expect("poll");
    let PollOutcome::Job(job) = outcome else {
        panic!("expected a job, got {outcome:?}");
    };
    assert_eq!(job.tile_name(), "vidéo.mp4_0");
}

#[tokio::test]
async fn rejected_uploads_surface_the_status() {
    let base = spawn_server(Router::new().route(
        work::RESULT,
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    ))
    .await;

    let err = client(&base)
        .send_result("v.mp4_0", boxed(&b"encoded"[..]))
        .await
        .expect_err("rejected");
    assert!(matches!(err, WorkerError::Rejected(StatusCode::INTERNAL_SERVER_ERROR)));
}

#[test]
fn endpoints_are_built_from_the_server_address() {
    let client = HttpJobClient::new("http://dispatch:1111/", Duration::from_secs(1)).expect("client");
    assert_eq!(client.poll_endpoint(), "http://dispatch:1111/work/jobs");
    assert_eq!(client.result_endpoint(), "http://dispatch:1111/work/result");
}
