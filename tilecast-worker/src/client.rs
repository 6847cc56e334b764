use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::{
    Body, Client, StatusCode,
    header::{CONNECTION, CONTENT_DISPOSITION, CONTENT_TYPE, HeaderValue},
};
use tilecast_core::{ByteStream, Job, api_routes::work, stream::boxed, wire};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, WorkerError},
    ports::{JobSource, PollOutcome, ResultSink},
};

/// Long-polling HTTP client for the dispatch server.
///
/// No overall request timeout is set: a poll is expected to hang for up to
/// the server's dispatch timeout.
#[derive(Debug, Clone)]
pub struct HttpJobClient {
    client: Client,
    poll_endpoint: String,
    result_endpoint: String,
}

impl HttpJobClient {
    pub fn new(server_addr: &str, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self::with_client(client, server_addr))
    }

    pub fn with_client(client: Client, server_addr: &str) -> Self {
        let base = server_addr.trim_end_matches('/');
        Self {
            client,
            poll_endpoint: format!("{base}{}", work::JOBS),
            result_endpoint: format!("{base}{}", work::RESULT),
        }
    }

    pub fn poll_endpoint(&self) -> &str {
        &self.poll_endpoint
    }

    pub fn result_endpoint(&self) -> &str {
        &self.result_endpoint
    }
}

#[async_trait]
impl JobSource for HttpJobClient {
    async fn poll(&self) -> Result<PollOutcome> {
        debug!(endpoint = %self.poll_endpoint, "polling for work");
        let response = self
            .client
            .post(&self.poll_endpoint)
            .header(CONNECTION, HeaderValue::from_static("keep-alive"))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_MODIFIED => {
                debug!("poll timed out without work");
                Ok(PollOutcome::NoWork)
            }
            StatusCode::OK => {
                let header = wire::decode_header(response.headers())?;
                info!(tile = %header.tile_name, width = header.width, height = header.height, "job received");

                let body = response.bytes_stream().map_err(std::io::Error::other);
                Ok(PollOutcome::Job(Job::new(header, boxed(StreamReader::new(body)))))
            }
            status => {
                warn!(%status, "unexpected poll status");
                Err(WorkerError::Rejected(status))
            }
        }
    }
}

#[async_trait]
impl ResultSink for HttpJobClient {
    async fn send_result(&self, tile_name: &str, src: ByteStream) -> Result<()> {
        let disposition = wire::attachment_disposition(tile_name)?;

        let response = self
            .client
            .post(&self.result_endpoint)
            .header(CONTENT_DISPOSITION, disposition)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
            .body(Body::wrap_stream(ReaderStream::new(src)))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(tile = %tile_name, %status, "result upload rejected");
            return Err(WorkerError::Rejected(status));
        }

        info!(tile = %tile_name, "result uploaded");
        Ok(())
    }
}
