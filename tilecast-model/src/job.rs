use serde::{Deserialize, Serialize};

use crate::geometry::EncodeDims;

/// Job metadata carried out-of-band from the streamed tile payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHeader {
    pub tile_name: String,
    pub width: u32,
    pub height: u32,
}

impl JobHeader {
    pub fn new(tile_name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            tile_name: tile_name.into(),
            width,
            height,
        }
    }

    pub fn dims(&self) -> EncodeDims {
        EncodeDims::new(self.width, self.height)
    }
}
