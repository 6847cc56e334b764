//! Capabilities consumed by the dispatch core.
//!
//! Implementations must tolerate concurrent calls: several dispatch calls and
//! result uploads may hit the same instance at once and the core adds no
//! serialization around them.

use async_trait::async_trait;
use tilecast_model::{CropGeometry, EncodeDims};

use crate::{
    error::{StoreError, TranscodeError},
    stream::ByteStream,
};

/// Object storage for source lookups and tile results.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Drain `src` fully into the object named `key`.
    async fn write_object(&self, key: &str, src: ByteStream) -> Result<(), StoreError>;

    async fn has_object(&self, key: &str) -> bool;

    /// The location `has_object` checked for `key`, handed on to the crop
    /// stage so both look at the same file.
    fn resolve_source(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Opens a raw byte stream of one cropped tile.
#[async_trait]
pub trait TileStreamer: Send + Sync {
    async fn open_crop_stream(
        &self,
        geometry: &CropGeometry,
    ) -> Result<ByteStream, TranscodeError>;
}

/// Encodes a raw tile stream of the given frame size.
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    async fn encode(
        &self,
        input: ByteStream,
        dims: EncodeDims,
    ) -> Result<ByteStream, TranscodeError>;
}
