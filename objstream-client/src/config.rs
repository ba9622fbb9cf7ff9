//! Adapter settings

use serde::Deserialize;

/// Configuration for [`ObjectStreamClient`](crate::ObjectStreamClient)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Re-chunk multipart input into parts of exactly this many bytes
    /// (the last part may be shorter). `None` uploads every incoming chunk
    /// as its own part.
    pub part_size: Option<usize>,
    /// Chunks an [`UploadSink`](crate::UploadSink) buffers before `send_chunk` waits
    pub sink_capacity: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            part_size: None,
            sink_capacity: 16,
        }
    }
}

impl AdapterConfig {
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = Some(part_size);
        self
    }

    /// Part size in effect; zero disables coalescing
    pub(crate) fn effective_part_size(&self) -> Option<usize> {
        self.part_size.filter(|size| *size > 0)
    }
}
