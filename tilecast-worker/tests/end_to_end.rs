use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tilecast_config::Config;
use tilecast_core::{
    ByteStream, MemoryStore, TileStreamer, TranscodeError, VideoEncoder, api_routes::work,
    stream::boxed,
};
use tilecast_model::{CropGeometry, EncodeDims};
use tilecast_server::{AppState, create_router};
use tilecast_worker::{HttpJobClient, PollLoop, Worker, WorkerError};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

struct OriginStreamer;

#[async_trait]
impl TileStreamer for OriginStreamer {
    async fn open_crop_stream(
        &self,
        geometry: &CropGeometry,
    ) -> Result<ByteStream, TranscodeError> {
        let payload = format!("{},{}", geometry.x, geometry.y).into_bytes();
        Ok(boxed(std::io::Cursor::new(payload)))
    }
}

/// Prefixes the raw tile with its frame size.
struct LabelEncoder;

#[async_trait]
impl VideoEncoder for LabelEncoder {
    async fn encode(
        &self,
        mut input: ByteStream,
        dims: EncodeDims,
    ) -> Result<ByteStream, TranscodeError> {
        let mut raw = Vec::new();
        input
            .read_to_end(&mut raw)
            .await
            .map_err(|err| TranscodeError::MissingStdout(err.to_string()))?;
        let mut out = format!("{}x{}:", dims.width, dims.height).into_bytes();
        out.extend(raw);
        Ok(boxed(std::io::Cursor::new(out)))
    }
}

#[tokio::test]
async fn a_worker_encodes_every_tile_of_a_triggered_request() {
    let store = Arc::new(MemoryStore::new());
    store.insert("/videos/clip été;1.mp4", b"source".to_vec());

    let mut config = Config::default();
    config.dispatch.timeout = Duration::from_millis(50);
    let state = AppState::new(&config, store.clone(), Arc::new(OriginStreamer));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    tokio::spawn(async move {
        axum::serve(listener, create_router(state))
            .await
            .expect("test server");
    });

    let trigger = reqwest::Client::new()
        .post(format!("{base}{}", work::TRIGGER))
        .header("content-type", "application/json")
        .body(r#"{"tiles": 2, "width": 720, "height": 1280, "filePath": "/videos/clip été;1.mp4"}"#)
        .send()
        .await
        .expect("trigger sent");
    assert_eq!(trigger.status(), reqwest::StatusCode::OK);

    let client = HttpJobClient::new(&base, Duration::from_secs(2)).expect("client");
    let worker = Worker::new(Arc::new(LabelEncoder), Arc::new(client.clone()));
    let poll_loop = PollLoop::new(client, Duration::from_millis(10));
    let cancel = CancellationToken::new();

    let running = tokio::spawn({
        let cancel = cancel.clone();
        async move { poll_loop.subscribe(&cancel, &worker).await }
    });

    tokio::time::timeout(Duration::from_secs(10), async {
        while store.get("clip été;1.mp4_0").is_none() || store.get("clip été;1.mp4_1").is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("both tiles uploaded");

    cancel.cancel();
    let outcome = running.await.expect("poll loop task");
    assert!(matches!(outcome, Err(WorkerError::Cancelled)));

    assert_eq!(store.get("clip été;1.mp4_0").as_deref(), Some(&b"720x640:0,0"[..]));
    assert_eq!(store.get("clip été;1.mp4_1").as_deref(), Some(&b"720x640:0,640"[..]));
}
