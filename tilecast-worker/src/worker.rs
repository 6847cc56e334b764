use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tilecast_core::{Job, VideoEncoder};
use tracing::info;

use crate::{
    error::Result,
    ports::{JobHandler, ResultSink},
};

/// Encodes each job's tile and relays the output back to the server.
#[derive(Clone)]
pub struct Worker {
    encoder: Arc<dyn VideoEncoder>,
    sink: Arc<dyn ResultSink>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(encoder: Arc<dyn VideoEncoder>, sink: Arc<dyn ResultSink>) -> Self {
        Self { encoder, sink }
    }
}

#[async_trait]
impl JobHandler for Worker {
    async fn handle(&self, job: Job) -> Result<()> {
        let dims = job.dims();
        let (header, body) = job.into_parts();
        info!(tile = %header.tile_name, width = dims.width, height = dims.height, "encoding tile");

        let encoded = self.encoder.encode(body, dims).await?;
        self.sink.send_result(&header.tile_name, encoded).await
    }
}
