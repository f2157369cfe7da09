//! Worker metrics.

use metrics::{counter, gauge, histogram};

use footfall_models::StreamState;

/// Metric name constants for consistency.
pub mod names {
    pub const FRAMES_RECEIVED_TOTAL: &str = "footfall_frames_received_total";
    pub const DETECTIONS_TOTAL: &str = "footfall_detections_total";
    pub const DETECTIONS_FAILED_TOTAL: &str = "footfall_detections_failed_total";
    pub const DETECTIONS_DISCARDED_TOTAL: &str = "footfall_detections_discarded_total";
    pub const DETECTION_LATENCY_SECONDS: &str = "footfall_detection_latency_seconds";
    pub const RECONNECT_ATTEMPTS_TOTAL: &str = "footfall_reconnect_attempts_total";
    pub const STATE_TRANSITIONS_TOTAL: &str = "footfall_state_transitions_total";
    pub const CAMERAS: &str = "footfall_cameras";
    pub const PUBLISH_TOTAL: &str = "footfall_publish_total";
    pub const OCCUPANCY: &str = "footfall_occupancy";
}

pub fn record_frame(camera_id: &str) {
    counter!(names::FRAMES_RECEIVED_TOTAL, "camera_id" => camera_id.to_string()).increment(1);
}

pub fn record_detection(camera_id: &str, latency_secs: f64) {
    counter!(names::DETECTIONS_TOTAL, "camera_id" => camera_id.to_string()).increment(1);
    histogram!(names::DETECTION_LATENCY_SECONDS, "camera_id" => camera_id.to_string())
        .record(latency_secs);
}

pub fn record_detection_failed(camera_id: &str) {
    counter!(names::DETECTIONS_FAILED_TOTAL, "camera_id" => camera_id.to_string()).increment(1);
}

/// A detection result arrived for a superseded generation.
pub fn record_detection_discarded(camera_id: &str) {
    counter!(names::DETECTIONS_DISCARDED_TOTAL, "camera_id" => camera_id.to_string())
        .increment(1);
}

pub fn record_reconnect_attempt(camera_id: &str) {
    counter!(names::RECONNECT_ATTEMPTS_TOTAL, "camera_id" => camera_id.to_string()).increment(1);
}

pub fn record_state_transition(camera_id: &str, state: StreamState) {
    counter!(
        names::STATE_TRANSITIONS_TOTAL,
        "camera_id" => camera_id.to_string(),
        "state" => state.as_str()
    )
    .increment(1);
}

/// Set the number of cameras in each state.
pub fn set_cameras_by_state(counts: &[(StreamState, usize)]) {
    for (state, count) in counts {
        gauge!(names::CAMERAS, "state" => state.as_str()).set(*count as f64);
    }
}

pub fn record_publish(camera_id: &str, ok: bool) {
    let status = if ok { "ok" } else { "failed" };
    counter!(
        names::PUBLISH_TOTAL,
        "camera_id" => camera_id.to_string(),
        "status" => status
    )
    .increment(1);
}

pub fn set_occupancy(camera_id: &str, occupancy: u64) {
    gauge!(names::OCCUPANCY, "camera_id" => camera_id.to_string()).set(occupancy as f64);
}
