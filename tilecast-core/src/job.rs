use std::fmt;

use tilecast_model::{EncodeDims, JobHeader};

use crate::stream::ByteStream;

/// A dispatched tile: metadata plus the opened stream of raw tile bytes.
///
/// The stream is owned by whoever holds the job and closes when dropped.
pub struct Job {
    pub header: JobHeader,
    pub body: ByteStream,
}

impl Job {
    pub fn new(header: JobHeader, body: ByteStream) -> Self {
        Self { header, body }
    }

    pub fn tile_name(&self) -> &str {
        &self.header.tile_name
    }

    pub fn dims(&self) -> EncodeDims {
        self.header.dims()
    }

    pub fn into_parts(self) -> (JobHeader, ByteStream) {
        (self.header, self.body)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}
