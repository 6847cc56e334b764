use serde::{Deserialize, Serialize};
use std::path::Path;

/// A request to split one source video into `tiles` spatial crops.
///
/// The JSON shape is the trigger payload accepted by the server:
/// `{"tiles": 4, "width": 720, "height": 1280, "filePath": "/tmp/v.mp4"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeRequest {
    #[serde(rename = "tiles")]
    pub tile_count: u32,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "filePath")]
    pub source_path: String,
}

impl EncodeRequest {
    pub fn new(
        tile_count: u32,
        width: u32,
        height: u32,
        source_path: impl Into<String>,
    ) -> Self {
        Self {
            tile_count,
            width,
            height,
            source_path: source_path.into(),
        }
    }

    /// Last path component of the source, used as the tile name prefix.
    pub fn source_file_name(&self) -> String {
        Path::new(&self.source_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
