use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;
use tilecast_core::{DispatchError, wire};
use tilecast_model::EncodeRequest;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, error, info, warn};

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// POST /work/trigger
///
/// The body is decoded as JSON whatever its declared content type.
pub async fn trigger_work_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<StatusCode> {
    let request: EncodeRequest = serde_json::from_slice(&body).map_err(|err| {
        warn!(error = %err, "rejected trigger payload");
        AppError::bad_request(format!("invalid trigger payload: {err}"))
    })?;

    let handle = state.dispatch.trigger_work(request).await.map_err(|err| {
        warn!(error = %err, "trigger rejected");
        AppError::from(err)
    })?;

    tokio::spawn(async move {
        let source = handle.source_path().to_string();
        match handle.join().await {
            Ok(summary) => info!(
                source = %summary.source_path,
                tiles = summary.handed_off,
                "trigger finished"
            ),
            Err(err) => warn!(source = %source, error = %err, "trigger stopped early"),
        }
    });

    Ok(StatusCode::OK)
}

/// POST /work/jobs
///
/// Long poll: waits up to the dispatch timeout, then answers 304 if no tile
/// showed up.
pub async fn poll_job_handler(State(state): State<AppState>) -> AppResult<Response> {
    let job = match state.dispatch.dispatch().await {
        Ok(job) => job,
        Err(DispatchError::Timeout) => return Ok(StatusCode::NOT_MODIFIED.into_response()),
        Err(err) => return Err(err.into()),
    };

    let tile = job.tile_name().to_string();
    let mut headers = HeaderMap::new();
    let body = wire::encode(job, &mut headers).map_err(|err| {
        error!(tile = %tile, error = %err, "failed to encode job headers");
        AppError::internal(err.to_string())
    })?;
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );

    info!(tile = %tile, "streaming tile to worker");
    Ok((
        StatusCode::OK,
        headers,
        Body::from_stream(ReaderStream::new(body)),
    )
        .into_response())
}

/// POST /work/result
pub async fn submit_result_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> AppResult<StatusCode> {
    let name = headers
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(wire::attachment_filename)
        .ok_or_else(|| {
            AppError::bad_request("Content-Disposition header with a filename is required")
        })?;

    debug!(tile = %name, "result upload started");

    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let reader = StreamReader::new(stream);

    state
        .dispatch
        .accept_result(&name, Box::pin(reader))
        .await?;

    Ok(StatusCode::OK)
}
