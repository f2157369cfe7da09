//! Detection adapter: raw service output to filtered canonical detections.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use footfall_models::{BoundingBox, CameraOptions, CanonicalSpace, DetectedObject, ObjectClass};
use footfall_stream::Frame;

use crate::error::DetectResult;
use crate::types::{DetectResponse, RawDetection};

/// The external detection capability.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Run detection on one frame.
    async fn detect(&self, frame: &Frame) -> DetectResult<DetectResponse>;

    /// Whether the capability is currently reachable.
    async fn health_check(&self) -> bool {
        true
    }
}

/// Per-camera filtering thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionFilter {
    /// Minimum confidence (inclusive)
    pub min_confidence: f64,
    /// Minimum box width and height in canonical pixels (inclusive)
    pub min_bbox_px: f64,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self::from_options(&CameraOptions::default())
    }
}

impl DetectionFilter {
    pub fn from_options(options: &CameraOptions) -> Self {
        Self {
            min_confidence: options.detection_confidence_threshold,
            min_bbox_px: options.min_bbox_px,
        }
    }

    /// Convert and filter one raw detection.
    pub fn apply(&self, raw: &RawDetection, space: &CanonicalSpace) -> Option<DetectedObject> {
        if !raw.confidence.is_finite() || raw.confidence < self.min_confidence {
            return None;
        }
        if raw.bbox.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let bbox = space.to_canonical_box(BoundingBox::from_xywh(raw.bbox));
        if bbox.width < self.min_bbox_px || bbox.height < self.min_bbox_px {
            return None;
        }

        Some(DetectedObject::new(
            ObjectClass::from(raw.class.clone()),
            raw.confidence,
            bbox,
        ))
    }
}

/// Wraps a `Detector` and applies confidence and size floors.
#[derive(Clone)]
pub struct DetectionAdapter {
    detector: Arc<dyn Detector>,
}

impl DetectionAdapter {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self { detector }
    }

    /// Detect objects in a frame.
    ///
    /// Boxes are rescaled from the resolution reported by the service (or
    /// the frame's own resolution) into canonical space before the size
    /// floor is applied. Errors are returned as-is and never retried.
    pub async fn detect(
        &self,
        frame: &Frame,
        filter: &DetectionFilter,
    ) -> DetectResult<Vec<DetectedObject>> {
        let response = self.detector.detect(frame).await?;

        let space = CanonicalSpace::from_source(
            response.image_width.unwrap_or(frame.width),
            response.image_height.unwrap_or(frame.height),
        );

        let raw_count = response.objects.len();
        let objects: Vec<DetectedObject> = response
            .objects
            .iter()
            .filter_map(|raw| filter.apply(raw, &space))
            .collect();

        debug!(
            camera_id = %frame.camera_id,
            raw = raw_count,
            kept = objects.len(),
            "Filtered detections"
        );

        Ok(objects)
    }

    pub async fn health_check(&self) -> bool {
        self.detector.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectError;
    use chrono::Utc;
    use footfall_models::CameraId;

    struct FixedDetector(DetectResponse);

    #[async_trait]
    impl Detector for FixedDetector {
        async fn detect(&self, _frame: &Frame) -> DetectResult<DetectResponse> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    #[async_trait]
    impl Detector for FailingDetector {
        async fn detect(&self, _frame: &Frame) -> DetectResult<DetectResponse> {
            Err(DetectError::Timeout(5000))
        }
    }

    fn frame(width: u32, height: u32) -> Frame {
        Frame {
            camera_id: CameraId::from("cam-1"),
            sequence: 1,
            data: vec![1],
            content_type: "image/jpeg".to_string(),
            width,
            height,
            captured_at: Utc::now(),
        }
    }

    fn raw(class: &str, confidence: f64, bbox: [f64; 4]) -> RawDetection {
        RawDetection {
            class: class.to_string(),
            confidence,
            bbox,
        }
    }

    #[test]
    fn test_filter_thresholds_are_inclusive() {
        let filter = DetectionFilter::default();
        let space = CanonicalSpace::identity();

        assert!(filter.apply(&raw("person", 0.6, [0.0, 0.0, 20.0, 20.0]), &space).is_some());
        assert!(filter.apply(&raw("person", 0.59, [0.0, 0.0, 50.0, 50.0]), &space).is_none());
        assert!(filter.apply(&raw("person", 0.9, [0.0, 0.0, 19.9, 50.0]), &space).is_none());
        assert!(filter.apply(&raw("person", 0.9, [0.0, 0.0, 50.0, 19.9]), &space).is_none());
        assert!(filter
            .apply(&raw("person", f64::NAN, [0.0, 0.0, 50.0, 50.0]), &space)
            .is_none());
    }

    #[tokio::test]
    async fn test_adapter_rescales_before_size_floor() {
        // 640x360 source: a 15px box becomes 30px in canonical space
        let adapter = DetectionAdapter::new(Arc::new(FixedDetector(DetectResponse {
            objects: vec![
                raw("person", 0.8, [100.0, 50.0, 15.0, 15.0]),
                raw("person", 0.8, [0.0, 0.0, 8.0, 8.0]),
            ],
            image_width: None,
            image_height: None,
        })));

        let objects = adapter
            .detect(&frame(640, 360), &DetectionFilter::default())
            .await
            .unwrap();

        assert_eq!(objects.len(), 1);
        assert!(objects[0].is_person());
        assert_eq!(objects[0].bbox, BoundingBox::new(200.0, 100.0, 30.0, 30.0));
    }

    #[tokio::test]
    async fn test_adapter_prefers_reported_resolution() {
        let adapter = DetectionAdapter::new(Arc::new(FixedDetector(DetectResponse {
            objects: vec![raw("person", 0.8, [10.0, 10.0, 64.0, 36.0])],
            image_width: Some(640),
            image_height: Some(360),
        })));

        let objects = adapter
            .detect(&frame(1280, 720), &DetectionFilter::default())
            .await
            .unwrap();
        assert_eq!(objects[0].bbox.width, 128.0);
        assert_eq!(objects[0].bbox.height, 72.0);
    }

    #[tokio::test]
    async fn test_adapter_passes_errors_through() {
        let adapter = DetectionAdapter::new(Arc::new(FailingDetector));
        let err = adapter
            .detect(&frame(1280, 720), &DetectionFilter::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
