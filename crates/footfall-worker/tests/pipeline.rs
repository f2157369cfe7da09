//! End-to-end supervisor tests against scripted cameras and detectors.
//!
//! All tests run on a paused clock, so backoff schedules and staleness
//! thresholds elapse instantly while keeping their ordering.

use std::collections::VecDeque;
use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::sleep;

use footfall_detect::{
    DetectError, DetectResponse, DetectResult, DetectionAdapter, Detector, RawDetection,
};
use footfall_models::{
    AnalyticsReport, CalibrationLine, CalibrationSnapshot, Camera, CameraId, CameraOptions,
    EntryDirection, Point, StreamState,
};
use footfall_store::{AnalyticsSink, CalibrationStore, StoreError, StoreResult};
use footfall_stream::{Frame, FrameSource, FrameStream, StreamError, StreamResult};
use footfall_worker::{
    AnalyticsPublisher, CameraFleet, CameraSpec, SupervisorContext, WorkerConfig, WorkerError,
};

const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// What the next `open` call does.
#[derive(Clone, Copy)]
enum Script {
    /// Deliver `frames` frames, then stop delivering without closing
    Stream { frames: u64 },
    Refuse,
}

#[derive(Default)]
struct ScriptedSource {
    scripts: Mutex<VecDeque<Script>>,
    /// Used once the queue is empty
    fallback: Mutex<Option<Script>>,
    opens: AtomicUsize,
}

impl ScriptedSource {
    fn always(script: Script) -> Arc<Self> {
        let source = Self::default();
        *source.fallback.lock().unwrap() = Some(script);
        Arc::new(source)
    }

    fn queue(scripts: Vec<Script>, fallback: Script) -> Arc<Self> {
        let source = Self::default();
        *source.scripts.lock().unwrap() = scripts.into();
        *source.fallback.lock().unwrap() = Some(fallback);
        Arc::new(source)
    }

    fn set_fallback(&self, script: Script) {
        *self.fallback.lock().unwrap() = Some(script);
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn open(&self, camera: &Camera) -> StreamResult<Box<dyn FrameStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .or(*self.fallback.lock().unwrap())
            .unwrap_or(Script::Refuse);

        match script {
            Script::Refuse => Err(StreamError::unavailable("connection refused")),
            Script::Stream { frames } => Ok(Box::new(ScriptedStream {
                camera: camera.clone(),
                remaining: frames,
                sequence: 0,
            })),
        }
    }
}

struct ScriptedStream {
    camera: Camera,
    remaining: u64,
    sequence: u64,
}

#[async_trait]
impl FrameStream for ScriptedStream {
    async fn next_frame(&mut self) -> StreamResult<Frame> {
        if self.remaining == 0 {
            return pending().await;
        }
        sleep(FRAME_INTERVAL).await;
        self.remaining -= 1;
        self.sequence += 1;

        Ok(Frame {
            camera_id: self.camera.id.clone(),
            sequence: self.sequence,
            data: vec![0xFF, 0xD8, 0xFF, 0xD9],
            content_type: "image/jpeg".to_string(),
            width: self.camera.width,
            height: self.camera.height,
            captured_at: Utc::now(),
        })
    }

    fn endpoint(&self) -> &str {
        &self.camera.stream_url
    }
}

/// Reports a scripted number of people per call, repeating the last value.
///
/// A `None` step fails the call with a service error instead.
struct ScriptedDetector {
    people: Mutex<VecDeque<Option<usize>>>,
    last: AtomicUsize,
    latency: Duration,
    calls: AtomicUsize,
    failures: AtomicUsize,
}

impl ScriptedDetector {
    fn new(people: Vec<usize>) -> Arc<Self> {
        Self::with_latency(people, Duration::ZERO)
    }

    fn with_latency(people: Vec<usize>, latency: Duration) -> Arc<Self> {
        Self::scripted(people.into_iter().map(Some).collect(), latency)
    }

    fn scripted(steps: Vec<Option<usize>>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            people: Mutex::new(steps.into()),
            last: AtomicUsize::new(0),
            latency,
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        })
    }

    fn set(&self, people: usize) {
        self.people.lock().unwrap().clear();
        self.last.store(people, Ordering::SeqCst);
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(&self, _frame: &Frame) -> DetectResult<DetectResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        let step = self.people.lock().unwrap().pop_front();
        let people = match step {
            Some(Some(n)) => {
                self.last.store(n, Ordering::SeqCst);
                n
            }
            Some(None) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                return Err(DetectError::service("model server returned 503"));
            }
            None => self.last.load(Ordering::SeqCst),
        };

        let objects = (0..people)
            .map(|i| RawDetection {
                class: "person".to_string(),
                confidence: 0.9,
                bbox: [40.0 + 100.0 * i as f64, 300.0, 60.0, 160.0],
            })
            .collect();

        Ok(DetectResponse {
            objects,
            image_width: None,
            image_height: None,
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    reports: Mutex<Vec<(CameraId, AnalyticsReport)>>,
    fail: bool,
}

impl RecordingSink {
    fn reports(&self) -> Vec<(CameraId, AnalyticsReport)> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    async fn submit_analytics(&self, camera_id: &CameraId, report: &AnalyticsReport) -> StoreResult<()> {
        if self.fail {
            return Err(StoreError::request_failed("persistence API unavailable"));
        }
        self.reports
            .lock()
            .unwrap()
            .push((camera_id.clone(), report.clone()));
        Ok(())
    }
}

fn fast_options() -> CameraOptions {
    CameraOptions {
        analysis_interval_ms: 1000,
        frame_interval_ms: 100,
        health_check_interval_ms: 2000,
        stale_threshold_ms: 3000,
        ..Default::default()
    }
}

fn camera(id: &str) -> Camera {
    Camera::new(id, "http://10.0.0.5/snapshot.jpg").with_options(fast_options())
}

fn door_line() -> CalibrationLine {
    CalibrationLine::new(
        Point::new(100.0, 360.0),
        Point::new(1180.0, 360.0),
        EntryDirection::default(),
    )
}

fn calibrated() -> CalibrationSnapshot {
    CalibrationSnapshot {
        line: Some(door_line()),
        ..Default::default()
    }
}

fn fleet(source: Arc<ScriptedSource>, detector: Arc<ScriptedDetector>) -> Arc<CameraFleet> {
    let ctx = SupervisorContext {
        source,
        detector: DetectionAdapter::new(detector),
        max_logged_failures: 3,
    };
    let config = WorkerConfig {
        publish_interval: Duration::from_secs(5),
        ..Default::default()
    };
    Arc::new(CameraFleet::new(ctx, Arc::new(CalibrationStore::new()), config))
}

#[tokio::test(start_paused = true)]
async fn test_counts_entries_and_exits() {
    let source = ScriptedSource::always(Script::Stream { frames: 10_000 });
    let detector = ScriptedDetector::new(vec![5, 7, 7, 4]);
    let fleet = fleet(source, detector);
    let id = CameraId::from("lobby");

    fleet
        .register_spec(CameraSpec {
            camera: camera("lobby"),
            calibration: Some(calibrated()),
        })
        .await
        .unwrap();

    sleep(Duration::from_secs(10)).await;

    let status = fleet.status(&id).await.unwrap();
    assert_eq!(status.state, StreamState::Active);
    assert!(status.calibrated);
    assert_eq!(status.people_count, 4);
    assert_eq!(status.counts.entries, 2);
    assert_eq!(status.counts.exits, 3);
    assert_eq!(status.counts.current_occupancy, 0);
    assert!(status.recommended_actions.is_empty());

    fleet.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_detection_keeps_previous_counts() {
    let source = ScriptedSource::always(Script::Stream { frames: 10_000 });
    let detector = ScriptedDetector::scripted(
        vec![Some(5), None, None, None, None, None, None],
        Duration::ZERO,
    );
    let fleet = fleet(source, detector.clone());
    let id = CameraId::from("lobby");

    fleet
        .register_spec(CameraSpec {
            camera: camera("lobby"),
            calibration: Some(calibrated()),
        })
        .await
        .unwrap();

    sleep(Duration::from_millis(3500)).await;
    assert!(detector.failures.load(Ordering::SeqCst) >= 1);

    let status = fleet.status(&id).await.unwrap();
    assert_eq!(status.state, StreamState::Active);
    assert_eq!(status.people_count, 5);
    assert_eq!(status.counts.entries, 0);
    assert_eq!(status.counts.exits, 0);

    // The delta is taken against the count from before the failures
    detector.set(8);
    sleep(Duration::from_secs(3)).await;

    let status = fleet.status(&id).await.unwrap();
    assert_eq!(status.people_count, 8);
    assert_eq!(status.counts.entries, 3);
    assert_eq!(status.counts.exits, 0);
    assert_eq!(status.counts.current_occupancy, 3);

    fleet.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_uncalibrated_camera_counts_nothing_until_line_is_drawn() {
    let source = ScriptedSource::always(Script::Stream { frames: 10_000 });
    let detector = ScriptedDetector::new(vec![3]);
    let fleet = fleet(source, detector.clone());
    let id = CameraId::from("lobby");

    fleet.register(camera("lobby")).await.unwrap();
    sleep(Duration::from_secs(4)).await;

    let status = fleet.status(&id).await.unwrap();
    assert!(!status.calibrated);
    assert_eq!(status.people_count, 3);
    assert_eq!(status.counts.entries, 0);
    assert!(status
        .recommended_actions
        .iter()
        .any(|a| a.contains("crossing line")));

    // The baseline kept moving while uncalibrated, so only the delta counts
    fleet.calibration().set_line(&id, Some(door_line())).await.unwrap();
    sleep(Duration::from_secs(2)).await;
    detector.set(6);
    sleep(Duration::from_secs(3)).await;

    let status = fleet.status(&id).await.unwrap();
    assert!(status.calibrated);
    assert_eq!(status.calibration_version, 1);
    assert_eq!(status.counts.entries, 3);
    assert_eq!(status.counts.current_occupancy, 3);

    fleet.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_backoff_exhaustion_then_manual_refresh() {
    let source = ScriptedSource::always(Script::Refuse);
    let fleet = fleet(source.clone(), ScriptedDetector::new(vec![1]));
    let id = CameraId::from("gate");

    fleet.register(camera("gate")).await.unwrap();

    sleep(Duration::from_secs(1)).await;
    let status = fleet.status(&id).await.unwrap();
    assert_eq!(status.state, StreamState::Reconnecting);
    assert_eq!(status.attempt, 1);
    assert_eq!(status.next_delay_ms, Some(2000));
    assert!(status.last_error.is_some());

    // 2000 + 3000 + 4500 + 6750 + 10125 ms of backoff, then give up
    sleep(Duration::from_secs(30)).await;
    let status = fleet.status(&id).await.unwrap();
    assert_eq!(status.state, StreamState::Failed);
    assert_eq!(status.max_attempts, 5);
    assert_eq!(status.next_delay_ms, None);
    assert_eq!(source.opens(), 6);
    assert!(status
        .recommended_actions
        .iter()
        .any(|a| a.contains("manual refresh")));

    // Failed stays failed without intervention
    sleep(Duration::from_secs(60)).await;
    assert_eq!(source.opens(), 6);

    source.set_fallback(Script::Stream { frames: 10_000 });
    fleet.refresh(&id).await.unwrap();
    sleep(Duration::from_secs(1)).await;

    let status = fleet.status(&id).await.unwrap();
    assert_eq!(status.state, StreamState::Active);
    assert_eq!(status.attempt, 0);
    assert_eq!(status.generation, 1);
    assert!(status.last_frame_at.is_some());

    fleet.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_stream_reopens_without_consuming_an_attempt() {
    let source = ScriptedSource::queue(
        vec![Script::Stream { frames: 5 }],
        Script::Stream { frames: 10_000 },
    );
    let fleet = fleet(source.clone(), ScriptedDetector::new(vec![0]));
    let id = CameraId::from("dock");

    fleet.register(camera("dock")).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(fleet.status(&id).await.unwrap().state, StreamState::Active);

    // Frames stop at 0.5 s; the check at 4 s sees 3.5 s of silence
    sleep(Duration::from_secs(4)).await;

    let status = fleet.status(&id).await.unwrap();
    assert_eq!(source.opens(), 2);
    assert_eq!(status.state, StreamState::Active);
    assert_eq!(status.attempt, 0);
    assert_eq!(status.generation, 0);

    fleet.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_discards_result_from_previous_generation() {
    let source = ScriptedSource::always(Script::Stream { frames: 10_000 });
    let detector = ScriptedDetector::with_latency(vec![5], Duration::from_millis(2500));
    let fleet = fleet(source, detector.clone());
    let id = CameraId::from("atrium");

    fleet
        .register_spec(CameraSpec {
            camera: camera("atrium"),
            calibration: Some(calibrated()),
        })
        .await
        .unwrap();

    // First detection starts at 1 s and lands at 3.5 s, after the refresh
    sleep(Duration::from_secs(2)).await;
    fleet.refresh(&id).await.unwrap();

    sleep(Duration::from_millis(1800)).await;
    let status = fleet.status(&id).await.unwrap();
    assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(status.people_count, 0);
    assert_eq!(status.generation, 1);

    // The tick at 4 s starts a detection for the new generation
    sleep(Duration::from_millis(3700)).await;
    let status = fleet.status(&id).await.unwrap();
    assert_eq!(status.people_count, 5);

    fleet.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_fleet_registration_rules() {
    let source = ScriptedSource::always(Script::Stream { frames: 10_000 });
    let fleet = fleet(source, ScriptedDetector::new(vec![0]));

    fleet.register(camera("a")).await.unwrap();
    fleet.register(camera("b")).await.unwrap();

    let err = fleet.register(camera("a")).await.unwrap_err();
    assert!(matches!(err, WorkerError::DuplicateCamera(_)));

    let statuses = fleet.statuses().await;
    let ids: Vec<&str> = statuses.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    fleet.remove(&CameraId::from("a")).await.unwrap();
    assert_eq!(fleet.len().await, 1);

    let err = fleet.remove(&CameraId::from("a")).await.unwrap_err();
    assert!(matches!(err, WorkerError::CameraNotFound(_)));

    let err = fleet.refresh(&CameraId::from("missing")).await.unwrap_err();
    assert!(matches!(err, WorkerError::CameraNotFound(_)));

    fleet.shutdown_all().await;
    assert!(fleet.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_publisher_reports_active_cameras_only() {
    let source = ScriptedSource::queue(
        vec![Script::Stream { frames: 10_000 }, Script::Refuse],
        Script::Refuse,
    );
    let fleet = fleet(source, ScriptedDetector::new(vec![2]));

    fleet
        .register_spec(CameraSpec {
            camera: camera("open"),
            calibration: Some(calibrated()),
        })
        .await
        .unwrap();
    sleep(Duration::from_secs(1)).await;
    fleet.register(camera("down")).await.unwrap();
    sleep(Duration::from_secs(2)).await;

    let sink = Arc::new(RecordingSink::default());
    let mut publisher = AnalyticsPublisher::new(fleet.clone(), sink.clone());

    let summary = publisher.publish_once().await;
    assert_eq!(summary.published, 1);
    assert_eq!(summary.failed, 0);

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0.as_str(), "open");
    assert_eq!(reports[0].1.people_count, 2);
    assert!(reports[0].1.calibrated);
    assert!(reports[0].1.heatmap_grid.is_some());

    fleet.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_publisher_survives_sink_failures_and_flushes_on_shutdown() {
    let source = ScriptedSource::always(Script::Stream { frames: 10_000 });
    let fleet = fleet(source, ScriptedDetector::new(vec![1]));
    fleet.register(camera("lobby")).await.unwrap();
    sleep(Duration::from_secs(2)).await;

    let failing = Arc::new(RecordingSink {
        fail: true,
        ..Default::default()
    });
    let mut publisher = AnalyticsPublisher::new(fleet.clone(), failing);
    let summary = publisher.publish_once().await;
    assert_eq!(summary.failed, 1);
    assert_eq!(publisher.publish_once().await.failed, 1);

    let sink = Arc::new(RecordingSink::default());
    let publisher = AnalyticsPublisher::new(fleet.clone(), sink.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(publisher.run(shutdown_rx));

    // Two 5 s ticks, then the shutdown flush
    sleep(Duration::from_secs(11)).await;
    shutdown_tx.send(true).unwrap();
    task.await.unwrap();

    assert_eq!(sink.reports().len(), 3);

    fleet.shutdown_all().await;
}
