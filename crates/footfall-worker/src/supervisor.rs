//! Per-camera stream supervisor.
//!
//! Each camera runs one task that owns the stream lifecycle:
//! - opening the stream (in a child task, so commands stay responsive)
//! - a frame pump that keeps only the newest frame in a `watch` slot
//! - an analysis tick that sends the newest unseen frame to detection,
//!   one call in flight at a time so results apply in order
//! - a health-check tick that flags stale streams and forces a reopen
//! - backoff between failed attempts, and `Failed` once attempts run out
//!
//! A refresh bumps the generation; detection results computed for an
//! older generation are discarded when they arrive.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn, Instrument, Span};

use footfall_detect::{DetectResult, DetectionAdapter, DetectionFilter};
use footfall_models::{CalibrationSnapshot, Camera, DetectedObject, StreamHealth};
use footfall_stream::{Frame, FrameSource, FrameStream, StreamError, StreamResult};

use crate::backoff::ReconnectPolicy;
use crate::error::{WorkerError, WorkerResult};
use crate::health::{FailureDirective, HealthMachine};
use crate::metrics;
use crate::pipeline::CameraPipeline;
use crate::retry::FailureTracker;

/// Shared collaborators for every supervisor.
#[derive(Clone)]
pub struct SupervisorContext {
    pub source: Arc<dyn FrameSource>,
    pub detector: DetectionAdapter,
    /// Identical failures logged before suppression
    pub max_logged_failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorCommand {
    /// Drop the stream, bump the generation and reconnect from scratch
    Refresh,
    Shutdown,
}

/// Owner's view of a running supervisor.
pub struct SupervisorHandle {
    camera: Camera,
    commands: mpsc::Sender<SupervisorCommand>,
    health: watch::Receiver<StreamHealth>,
    pipeline: Arc<Mutex<CameraPipeline>>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Start supervising `camera`.
    pub fn spawn(
        camera: Camera,
        ctx: SupervisorContext,
        calibration: watch::Receiver<Arc<CalibrationSnapshot>>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(8);
        let machine = HealthMachine::new(
            ReconnectPolicy::from_options(&camera.options),
            camera.options.stale_threshold(),
        );
        let (health_tx, health_rx) = watch::channel(machine.health().clone());
        let pipeline = Arc::new(Mutex::new(CameraPipeline::new(&camera)));
        let (frame_tx, frame_rx) = watch::channel(None);

        let supervisor = Supervisor {
            filter: DetectionFilter::from_options(&camera.options),
            detect_failures: FailureTracker::new("detect", ctx.max_logged_failures),
            stream_failures: FailureTracker::new("stream", ctx.max_logged_failures),
            camera: camera.clone(),
            ctx,
            machine,
            health_tx,
            pipeline: pipeline.clone(),
            calibration,
            commands: command_rx,
            frame_tx: Arc::new(frame_tx),
            frame_rx,
            connection: 0,
            connect: None,
            retry_at: None,
            pump: None,
            in_flight: None,
            last_analyzed: None,
        };

        let span = tracing::info_span!("camera", camera_id = %camera.id);
        let task = tokio::spawn(supervisor.run().instrument(span));

        Self {
            camera,
            commands: command_tx,
            health: health_rx,
            pipeline,
            task,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn health(&self) -> StreamHealth {
        self.health.borrow().clone()
    }

    pub fn subscribe_health(&self) -> watch::Receiver<StreamHealth> {
        self.health.clone()
    }

    pub fn pipeline(&self) -> Arc<Mutex<CameraPipeline>> {
        self.pipeline.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn refresh(&self) -> WorkerResult<()> {
        self.commands
            .send(SupervisorCommand::Refresh)
            .await
            .map_err(|_| WorkerError::SupervisorStopped(self.camera.id.to_string()))
    }

    /// Stop the supervisor, aborting it if it does not finish in time.
    pub async fn shutdown(mut self, timeout: Duration) {
        let _ = self.commands.send(SupervisorCommand::Shutdown).await;
        if tokio::time::timeout(timeout, &mut self.task).await.is_err() {
            warn!(camera_id = %self.camera.id, "Supervisor did not stop in time, aborting");
            self.task.abort();
        }
    }
}

/// Newest frame of one connection.
struct LatestFrame {
    connection: u64,
    frame: Arc<Frame>,
}

struct InFlight {
    generation: u64,
    started: Instant,
    handle: JoinHandle<DetectResult<Vec<DetectedObject>>>,
}

struct Supervisor {
    camera: Camera,
    ctx: SupervisorContext,
    filter: DetectionFilter,
    machine: HealthMachine,
    health_tx: watch::Sender<StreamHealth>,
    pipeline: Arc<Mutex<CameraPipeline>>,
    calibration: watch::Receiver<Arc<CalibrationSnapshot>>,
    commands: mpsc::Receiver<SupervisorCommand>,
    frame_tx: Arc<watch::Sender<Option<LatestFrame>>>,
    frame_rx: watch::Receiver<Option<LatestFrame>>,
    /// Bumped on every (re)open; frames from older connections are ignored
    connection: u64,
    connect: Option<JoinHandle<StreamResult<Box<dyn FrameStream>>>>,
    retry_at: Option<Instant>,
    pump: Option<JoinHandle<StreamError>>,
    in_flight: Option<InFlight>,
    /// (connection, sequence) of the last frame sent to detection
    last_analyzed: Option<(u64, u64)>,
    detect_failures: FailureTracker,
    stream_failures: FailureTracker,
}

impl Supervisor {
    async fn run(mut self) {
        info!(stream_url_scheme = scheme(&self.camera.stream_url), "Supervisor started");

        self.start_connect();

        let mut analysis = interval(self.camera.options.analysis_interval());
        analysis.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let health_period = self.camera.options.health_check_interval();
        let mut health_check = interval_at(Instant::now() + health_period, health_period);
        health_check.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SupervisorCommand::Refresh) => self.refresh(),
                    Some(SupervisorCommand::Shutdown) | None => break,
                },
                opened = join_slot(&mut self.connect) => {
                    self.connect = None;
                    self.on_opened(opened);
                }
                _ = sleep_slot(self.retry_at) => {
                    self.retry_at = None;
                    self.start_connect();
                }
                changed = self.frame_rx.changed() => {
                    if changed.is_ok() {
                        self.on_frame();
                    }
                }
                ended = join_slot(&mut self.pump) => {
                    self.pump = None;
                    self.on_pump_ended(ended);
                }
                _ = analysis.tick() => self.on_analysis_tick(),
                (generation, started, result) = join_in_flight(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.on_detection(generation, started, result).await;
                }
                _ = health_check.tick() => self.on_health_check(),
            }
        }

        self.teardown();
        info!("Supervisor stopped");
    }

    fn start_connect(&mut self) {
        self.stop_pump();
        if let Some(previous) = self.connect.take() {
            previous.abort();
        }

        self.connection += 1;
        let source = self.ctx.source.clone();
        let camera = self.camera.clone();
        self.connect = Some(tokio::spawn(
            async move { source.open(&camera).await }.instrument(Span::current()),
        ));

        debug!(
            connection = self.connection,
            attempt = self.machine.health().attempt,
            "Opening stream"
        );
    }

    fn on_opened(&mut self, opened: Result<StreamResult<Box<dyn FrameStream>>, JoinError>) {
        match opened {
            Ok(Ok(stream)) => {
                debug!(endpoint = stream.endpoint(), "Stream opened");
                self.start_pump(stream);
            }
            Ok(Err(e)) => self.on_stream_failure(e),
            Err(e) if e.is_cancelled() => {}
            Err(e) => self.on_stream_failure(StreamError::unavailable(format!(
                "connect task failed: {}",
                e
            ))),
        }
    }

    fn start_pump(&mut self, mut stream: Box<dyn FrameStream>) {
        let frames = self.frame_tx.clone();
        let connection = self.connection;

        self.pump = Some(tokio::spawn(
            async move {
                loop {
                    match stream.next_frame().await {
                        Ok(frame) => {
                            frames.send_replace(Some(LatestFrame {
                                connection,
                                frame: Arc::new(frame),
                            }));
                        }
                        Err(e) => return e,
                    }
                }
            }
            .instrument(Span::current()),
        ));
    }

    fn stop_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    fn on_pump_ended(&mut self, ended: Result<StreamError, JoinError>) {
        match ended {
            Ok(e) => self.on_stream_failure(e),
            Err(e) if e.is_cancelled() => {}
            Err(e) => self.on_stream_failure(StreamError::unavailable(format!(
                "frame pump failed: {}",
                e
            ))),
        }
    }

    fn on_stream_failure(&mut self, e: StreamError) {
        self.stop_pump();

        let message = e.to_string();
        match self.machine.on_failure(message.clone(), e.is_retryable()) {
            FailureDirective::RetryAfter(delay) => {
                let health = self.machine.health();
                if self.stream_failures.record_failure() {
                    warn!(
                        attempt = health.attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Stream failed, reconnecting after backoff"
                    );
                }
                metrics::record_reconnect_attempt(self.camera.id.as_str());
                self.retry_at = Some(Instant::now() + delay);
            }
            FailureDirective::GiveUp => {
                error!(
                    attempt = self.machine.health().attempt,
                    error = %message,
                    "Stream failed, manual refresh required"
                );
            }
        }

        metrics::record_state_transition(self.camera.id.as_str(), self.machine.state());
        self.publish_health();
    }

    fn on_frame(&mut self) {
        let connection = self.connection;
        let current = self
            .frame_rx
            .borrow_and_update()
            .as_ref()
            .map(|latest| latest.connection == connection)
            .unwrap_or(false);
        if !current {
            return;
        }

        metrics::record_frame(self.camera.id.as_str());
        if let Some(previous) = self.machine.on_frame(Instant::now()) {
            info!(from = %previous, "Stream active");
            self.stream_failures.record_success();
            metrics::record_state_transition(self.camera.id.as_str(), self.machine.state());
        }
        self.publish_health();
    }

    fn on_analysis_tick(&mut self) {
        // The next tick picks up whatever frame is newest by then
        if self.in_flight.is_some() {
            return;
        }

        let connection = self.connection;
        let latest = self
            .frame_rx
            .borrow()
            .as_ref()
            .filter(|latest| latest.connection == connection)
            .map(|latest| latest.frame.clone());
        let Some(frame) = latest else {
            return;
        };

        let key = (connection, frame.sequence);
        if self.last_analyzed == Some(key) {
            return;
        }
        self.last_analyzed = Some(key);

        let detector = self.ctx.detector.clone();
        let filter = self.filter;
        self.in_flight = Some(InFlight {
            generation: self.machine.generation(),
            started: Instant::now(),
            handle: tokio::spawn(
                async move { detector.detect(&frame, &filter).await }.instrument(Span::current()),
            ),
        });
    }

    async fn on_detection(
        &mut self,
        generation: u64,
        started: Instant,
        result: Result<DetectResult<Vec<DetectedObject>>, JoinError>,
    ) {
        let camera_id = self.camera.id.as_str();

        if generation != self.machine.generation() {
            debug!(
                generation,
                current = self.machine.generation(),
                "Discarding detection result from a superseded generation"
            );
            metrics::record_detection_discarded(camera_id);
            return;
        }

        match result {
            Ok(Ok(detections)) => {
                metrics::record_detection(camera_id, started.elapsed().as_secs_f64());
                self.detect_failures.record_success();

                let calibration = self.calibration.borrow().clone();
                let outcome = self
                    .pipeline
                    .lock()
                    .await
                    .apply(&detections, &calibration, Utc::now());

                metrics::set_occupancy(camera_id, outcome.count.current_occupancy);
                debug!(
                    people = outcome.people_count,
                    entries = outcome.count.entries,
                    exits = outcome.count.exits,
                    calibrated = outcome.calibrated,
                    "Applied detection cycle"
                );
            }
            Ok(Err(e)) => {
                metrics::record_detection_failed(camera_id);
                if self.detect_failures.record_failure() {
                    warn!(error = %e, "Detection failed, keeping previous state");
                }
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                metrics::record_detection_failed(camera_id);
                error!("Detection task failed: {}", e);
            }
        }
    }

    fn on_health_check(&mut self) {
        let now = Instant::now();
        if !self.machine.on_health_check(now) {
            return;
        }

        let idle_ms = self
            .machine
            .idle_for(now)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let stale = WorkerError::StaleStream {
            camera_id: self.camera.id.to_string(),
            idle_ms,
        };
        warn!(idle_ms, "{}, forcing reconnect", stale);
        metrics::record_state_transition(self.camera.id.as_str(), self.machine.state());
        self.publish_health();

        self.machine.begin_reconnect();
        metrics::record_state_transition(self.camera.id.as_str(), self.machine.state());
        self.start_connect();
        self.publish_health();
    }

    fn refresh(&mut self) {
        let generation = self.machine.refresh();
        info!(generation, "Refreshing stream");

        self.retry_at = None;
        self.last_analyzed = None;
        self.stream_failures.record_success();
        self.start_connect();

        metrics::record_state_transition(self.camera.id.as_str(), self.machine.state());
        self.publish_health();
    }

    fn teardown(&mut self) {
        self.stop_pump();
        if let Some(connect) = self.connect.take() {
            connect.abort();
        }
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.handle.abort();
        }
    }

    fn publish_health(&self) {
        self.health_tx.send_replace(self.machine.health().clone());
    }
}

async fn join_slot<T>(slot: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match slot {
        Some(handle) => handle.await,
        None => pending().await,
    }
}

async fn sleep_slot(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn join_in_flight(
    slot: &mut Option<InFlight>,
) -> (u64, Instant, Result<DetectResult<Vec<DetectedObject>>, JoinError>) {
    match slot {
        Some(in_flight) => {
            let result = (&mut in_flight.handle).await;
            (in_flight.generation, in_flight.started, result)
        }
        None => pending().await,
    }
}

/// Scheme of a stream URL, safe to log.
fn scheme(url: &str) -> &str {
    url.split_once("://").map(|(s, _)| s).unwrap_or("unknown")
}
