//! Materialized camera frames.

use chrono::{DateTime, Utc};

use footfall_models::CameraId;

/// One encoded image pulled from a camera stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub camera_id: CameraId,
    /// Monotonic per stream
    pub sequence: u64,
    /// Encoded image bytes (usually JPEG)
    pub data: Vec<u8>,
    pub content_type: String,
    /// Source resolution
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
