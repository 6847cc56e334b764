use std::{fmt, sync::Arc, time::Duration};

use tilecast_model::{EncodeRequest, JobHeader, TileDescriptor};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    error::{DispatchError, QueueError, Result},
    job::Job,
    partition::partition,
    ports::{Store, TileStreamer},
    queue::JobQueue,
    stream::ByteStream,
};

/// Wait applied to each dispatch call when none is configured.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Upper bound for a single dispatch call. Zero selects
    /// [`DEFAULT_DISPATCH_TIMEOUT`].
    pub dispatch_timeout: Duration,
}

impl DispatchConfig {
    pub fn with_timeout(dispatch_timeout: Duration) -> Self {
        Self { dispatch_timeout }
    }

    pub fn effective_timeout(&self) -> Duration {
        if self.dispatch_timeout.is_zero() {
            DEFAULT_DISPATCH_TIMEOUT
        } else {
            self.dispatch_timeout
        }
    }
}

/// Splits triggered encodes into tiles and hands them to polling workers.
///
/// Tiles flow through a rendezvous [`JobQueue`]: a trigger's background
/// producer blocks on every tile until some `dispatch` call takes it, so at
/// most one undispatched tile is ever in flight per trigger. A tile whose crop
/// stream fails to open is dropped, never requeued.
pub struct DispatchCoordinator {
    store: Arc<dyn Store>,
    streamer: Arc<dyn TileStreamer>,
    queue: Arc<JobQueue<TileDescriptor>>,
    dispatch_timeout: Duration,
}

impl fmt::Debug for DispatchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchCoordinator")
            .field("queue", &self.queue)
            .field("dispatch_timeout", &self.dispatch_timeout)
            .finish_non_exhaustive()
    }
}

impl DispatchCoordinator {
    /// Must be called from within a tokio runtime; the queue manager is
    /// spawned here.
    pub fn new(
        config: DispatchConfig,
        store: Arc<dyn Store>,
        streamer: Arc<dyn TileStreamer>,
    ) -> Self {
        Self {
            store,
            streamer,
            queue: Arc::new(JobQueue::new()),
            dispatch_timeout: config.effective_timeout(),
        }
    }

    pub fn dispatch_timeout(&self) -> Duration {
        self.dispatch_timeout
    }

    /// Validate `request` and start feeding its tiles into the queue.
    ///
    /// Returns as soon as the producer is spawned. The producer's outcome is
    /// reported through the returned [`TriggerHandle`].
    pub async fn trigger_work(&self, mut request: EncodeRequest) -> Result<TriggerHandle> {
        info!(
            source = %request.source_path,
            tiles = request.tile_count,
            width = request.width,
            height = request.height,
            "work triggered"
        );

        validate_request(&request)?;

        if self.queue.is_closed() {
            warn!(source = %request.source_path, "trigger refused, dispatch is shutting down");
            return Err(DispatchError::QueueClosed);
        }

        if !self.store.has_object(&request.source_path).await {
            return Err(DispatchError::SourceNotFound(request.source_path));
        }
        request.source_path = self.store.resolve_source(&request.source_path);

        let source_path = request.source_path.clone();
        let queue = Arc::clone(&self.queue);
        let task = tokio::spawn(produce_tiles(queue, request));

        Ok(TriggerHandle { source_path, task })
    }

    /// Claim the next tile and open its crop stream, waiting at most the
    /// configured dispatch timeout. Safe to call concurrently; each tile is
    /// observed by exactly one caller.
    pub async fn dispatch(&self) -> Result<Job> {
        let tile = match self.queue.recv_timeout(self.dispatch_timeout).await {
            Ok(tile) => tile,
            Err(QueueError::Timeout) => {
                debug!(wait = ?self.dispatch_timeout, "no tile available");
                return Err(DispatchError::Timeout);
            }
            Err(err) => return Err(err.into()),
        };

        let tile_name = tile.tile_name();
        info!(tile = %tile_name, source = %tile.source_path, index = tile.index, "dispatching tile");

        let body = self
            .streamer
            .open_crop_stream(&tile.crop_geometry())
            .await
            .map_err(|err| {
                error!(tile = %tile_name, error = %err, "failed to open crop stream, tile dropped");
                DispatchError::from(err)
            })?;

        Ok(Job::new(
            JobHeader::new(tile_name, tile.tile_width, tile.tile_height),
            body,
        ))
    }

    /// Persist an uploaded tile result under `name`.
    ///
    /// The name is not checked against previously dispatched tiles.
    pub async fn accept_result(&self, name: &str, src: ByteStream) -> Result<()> {
        info!(tile = %name, "accepting result");
        self.store.write_object(name, src).await?;
        info!(tile = %name, "result stored");
        Ok(())
    }

    /// Close the queue. Producers still feeding earlier triggers fail with
    /// [`DispatchError::QueueClosed`] instead of blocking forever.
    pub fn shutdown(&self) {
        info!("dispatch coordinator shutting down");
        self.queue.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.queue.is_closed()
    }
}

pub fn validate_request(request: &EncodeRequest) -> Result<()> {
    if request.tile_count == 0 {
        return Err(DispatchError::Validation("tiles must be greater than zero".into()));
    }
    if request.width == 0 || request.height == 0 {
        return Err(DispatchError::Validation(
            "width and height must be greater than zero".into(),
        ));
    }
    if request.source_path.trim().is_empty() {
        return Err(DispatchError::Validation("filePath must not be empty".into()));
    }
    Ok(())
}

async fn produce_tiles(
    queue: Arc<JobQueue<TileDescriptor>>,
    request: EncodeRequest,
) -> std::result::Result<EnqueueSummary, QueueError> {
    let tiles = partition(&request);
    let planned = tiles.len();
    let mut handed_off = 0;

    for tile in tiles {
        let index = tile.index;
        debug!(source = %request.source_path, index, "tile enqueued");

        if let Err(err) = queue.send(tile).await {
            warn!(
                source = %request.source_path,
                index,
                handed_off,
                planned,
                error = %err,
                "tile producer stopped"
            );
            return Err(err);
        }
        handed_off += 1;
    }

    info!(source = %request.source_path, handed_off, "all tiles dispatched");
    Ok(EnqueueSummary {
        source_path: request.source_path,
        handed_off,
    })
}

/// Outcome of a trigger's background producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueSummary {
    pub source_path: String,
    /// Tiles taken by dispatch calls.
    pub handed_off: usize,
}

/// Handle to the background producer started by
/// [`DispatchCoordinator::trigger_work`].
#[derive(Debug)]
pub struct TriggerHandle {
    source_path: String,
    task: JoinHandle<std::result::Result<EnqueueSummary, QueueError>>,
}

impl TriggerHandle {
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the producer to hand out every tile or stop.
    pub async fn join(self) -> Result<EnqueueSummary> {
        match self.task.await {
            Ok(outcome) => outcome.map_err(DispatchError::from),
            Err(join_error) => Err(DispatchError::ProducerAborted(join_error.to_string())),
        }
    }
}
