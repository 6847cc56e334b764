use async_trait::async_trait;
use tilecast_core::{ByteStream, Job};

use crate::error::Result;

/// Answer to a single poll request.
#[derive(Debug)]
pub enum PollOutcome {
    /// The server's dispatch wait elapsed without a tile.
    NoWork,
    Job(Job),
}

/// Where the poll loop gets its jobs from.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn poll(&self) -> Result<PollOutcome>;
}

/// Reverse path for encoded tiles.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Upload `src` under `tile_name`. Never retries.
    async fn send_result(&self, tile_name: &str, src: ByteStream) -> Result<()>;
}

/// Invoked once per received job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job) -> Result<()>;
}
