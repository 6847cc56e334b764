use serde::{Deserialize, Serialize};

/// Rectangle to crop out of `input_path`, in source pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropGeometry {
    pub input_path: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Frame size of a raw tile stream handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeDims {
    pub width: u32,
    pub height: u32,
}

impl EncodeDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
