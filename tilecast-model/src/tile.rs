use serde::{Deserialize, Serialize};

use crate::geometry::{CropGeometry, EncodeDims};

/// One grid cell of a partitioned [`EncodeRequest`](crate::EncodeRequest).
///
/// Descriptors are created by the partitioner and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDescriptor {
    pub index: u32,
    pub source_file_name: String,
    pub source_path: String,
    pub origin_x: u32,
    pub origin_y: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl TileDescriptor {
    /// Name the tile travels under on the wire and in the result store,
    /// e.g. `v.mp4_0`.
    pub fn tile_name(&self) -> String {
        format!("{}_{}", self.source_file_name, self.index)
    }

    pub fn crop_geometry(&self) -> CropGeometry {
        CropGeometry {
            input_path: self.source_path.clone(),
            x: self.origin_x,
            y: self.origin_y,
            width: self.tile_width,
            height: self.tile_height,
        }
    }

    pub fn dims(&self) -> EncodeDims {
        EncodeDims::new(self.tile_width, self.tile_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> TileDescriptor {
        TileDescriptor {
            index: 3,
            source_file_name: "v.mp4".into(),
            source_path: "/tmp/v.mp4".into(),
            origin_x: 360,
            origin_y: 640,
            tile_width: 360,
            tile_height: 640,
        }
    }

    #[test]
    fn tile_name_joins_file_and_index() {
        assert_eq!(descriptor().tile_name(), "v.mp4_3");
    }

    #[test]
    fn crop_geometry_carries_origin_and_extent() {
        let geometry = descriptor().crop_geometry();
        assert_eq!(
            geometry,
            CropGeometry {
                input_path: "/tmp/v.mp4".into(),
                x: 360,
                y: 640,
                width: 360,
                height: 640,
            }
        );
    }
}
