//! # Tilecast Core
//!
//! The dispatch core of Tilecast: a large video encode is split into
//! independent spatial tile jobs which remote workers pull over HTTP.
//!
//! ## Overview
//!
//! - [`partition`]: splits an [`EncodeRequest`] into a lazy sequence of
//!   [`TileDescriptor`]s laid out on a `columns x rows` grid
//! - [`queue`]: a capacity-zero rendezvous between tile producers and
//!   dispatch calls, which is where backpressure comes from
//! - [`dispatch`]: the [`DispatchCoordinator`] that validates triggers, feeds
//!   the queue in the background and hands tiles out with a bounded wait
//! - [`wire`]: the header codec that carries job metadata beside the streamed
//!   payload
//! - [`ports`]: the capabilities the core consumes (`Store`, `TileStreamer`,
//!   `VideoEncoder`)
//! - [`transcoder`] and [`store`]: the ffmpeg and filesystem implementations
//!   of those capabilities
//!
//! [`EncodeRequest`]: tilecast_model::EncodeRequest
//! [`TileDescriptor`]: tilecast_model::TileDescriptor
//! [`DispatchCoordinator`]: dispatch::DispatchCoordinator

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Route paths shared by the server and the worker
pub mod api_routes;

pub mod dispatch;
pub mod error;
pub mod job;
pub mod partition;
pub mod ports;
pub mod queue;
pub mod store;
pub mod stream;
pub mod transcoder;
pub mod wire;

pub use dispatch::{
    DEFAULT_DISPATCH_TIMEOUT, DispatchConfig, DispatchCoordinator, EnqueueSummary,
    TriggerHandle,
};
pub use error::{DispatchError, QueueError, StoreError, TranscodeError, WireError};
pub use job::Job;
pub use ports::{Store, TileStreamer, VideoEncoder};
pub use store::{FsObjectStore, MemoryStore};
pub use stream::ByteStream;
pub use transcoder::FfmpegTranscoder;
