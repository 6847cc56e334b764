//! Core data model definitions shared across Tilecast crates.
#![allow(missing_docs)]

pub mod geometry;
pub mod job;
pub mod request;
pub mod tile;

pub use geometry::{CropGeometry, EncodeDims};
pub use job::JobHeader;
pub use request::EncodeRequest;
pub use tile::TileDescriptor;
