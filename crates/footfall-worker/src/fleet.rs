//! Registry of supervised cameras.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use chrono::Utc;

use footfall_models::{AnalyticsReport, Camera, CameraId, StreamState};
use footfall_store::CalibrationStore;
use footfall_stream::normalize_endpoint;

use crate::config::{CameraSpec, WorkerConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::CameraPipeline;
use crate::status::{recommended_actions, CameraStatusView};
use crate::supervisor::{SupervisorContext, SupervisorHandle};

const ALL_STATES: [StreamState; 5] = [
    StreamState::Connecting,
    StreamState::Active,
    StreamState::Stale,
    StreamState::Reconnecting,
    StreamState::Failed,
];

/// Every camera the worker supervises, keyed by id.
pub struct CameraFleet {
    ctx: SupervisorContext,
    calibration: Arc<CalibrationStore>,
    config: WorkerConfig,
    cameras: RwLock<HashMap<CameraId, SupervisorHandle>>,
}

impl CameraFleet {
    pub fn new(ctx: SupervisorContext, calibration: Arc<CalibrationStore>, config: WorkerConfig) -> Self {
        Self {
            ctx,
            calibration,
            config,
            cameras: RwLock::new(HashMap::new()),
        }
    }

    pub fn calibration(&self) -> &Arc<CalibrationStore> {
        &self.calibration
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Validate a camera and start supervising it.
    pub async fn register(&self, camera: Camera) -> WorkerResult<CameraStatusView> {
        validate_camera(&camera)?;

        let mut cameras = self.cameras.write().await;
        if cameras.contains_key(&camera.id) {
            return Err(WorkerError::DuplicateCamera(camera.id.to_string()));
        }

        let calibration = self.calibration.subscribe(&camera.id).await;
        let handle = SupervisorHandle::spawn(camera.clone(), self.ctx.clone(), calibration);
        info!(camera_id = %camera.id, name = %camera.name, "Registered camera");

        let view = self.view(&handle).await;
        cameras.insert(camera.id, handle);
        Ok(view)
    }

    /// Register a camera from the cameras file, seeding its calibration.
    pub async fn register_spec(&self, spec: CameraSpec) -> WorkerResult<CameraStatusView> {
        let CameraSpec { camera, calibration } = spec;
        validate_camera(&camera)?;
        if self.contains(&camera.id).await {
            return Err(WorkerError::DuplicateCamera(camera.id.to_string()));
        }

        if let Some(snapshot) = calibration {
            self.calibration.load(&camera.id, snapshot).await?;
        }
        self.register(camera).await
    }

    /// Stop supervising a camera and drop its calibration.
    pub async fn remove(&self, camera_id: &CameraId) -> WorkerResult<()> {
        let handle = self
            .cameras
            .write()
            .await
            .remove(camera_id)
            .ok_or_else(|| WorkerError::CameraNotFound(camera_id.to_string()))?;

        handle.shutdown(self.config.shutdown_timeout).await;
        self.calibration.remove(camera_id).await;
        info!(camera_id = %camera_id, "Removed camera");
        Ok(())
    }

    /// Manually reconnect a camera, typically one that has `Failed`.
    pub async fn refresh(&self, camera_id: &CameraId) -> WorkerResult<CameraStatusView> {
        let cameras = self.cameras.read().await;
        let handle = cameras
            .get(camera_id)
            .ok_or_else(|| WorkerError::CameraNotFound(camera_id.to_string()))?;

        handle.refresh().await?;
        Ok(self.view(handle).await)
    }

    pub async fn contains(&self, camera_id: &CameraId) -> bool {
        self.cameras.read().await.contains_key(camera_id)
    }

    pub async fn len(&self) -> usize {
        self.cameras.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cameras.read().await.is_empty()
    }

    pub async fn camera(&self, camera_id: &CameraId) -> WorkerResult<Camera> {
        self.cameras
            .read()
            .await
            .get(camera_id)
            .map(|handle| handle.camera().clone())
            .ok_or_else(|| WorkerError::CameraNotFound(camera_id.to_string()))
    }

    pub async fn status(&self, camera_id: &CameraId) -> WorkerResult<CameraStatusView> {
        let cameras = self.cameras.read().await;
        let handle = cameras
            .get(camera_id)
            .ok_or_else(|| WorkerError::CameraNotFound(camera_id.to_string()))?;
        Ok(self.view(handle).await)
    }

    /// Current analytics of one camera, whatever its stream state.
    pub async fn report(&self, camera_id: &CameraId, include_grid: bool) -> WorkerResult<AnalyticsReport> {
        let pipeline = {
            let cameras = self.cameras.read().await;
            cameras
                .get(camera_id)
                .map(|handle| handle.pipeline())
                .ok_or_else(|| WorkerError::CameraNotFound(camera_id.to_string()))?
        };
        let calibration = self.calibration.get(camera_id).await;
        let report = pipeline.lock().await.report(&calibration, Utc::now(), include_grid);
        Ok(report)
    }

    /// Status of every camera, ordered by id.
    pub async fn statuses(&self) -> Vec<CameraStatusView> {
        let cameras = self.cameras.read().await;
        let mut views = Vec::with_capacity(cameras.len());
        for handle in cameras.values() {
            views.push(self.view(handle).await);
        }
        views.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        views
    }

    /// Pipelines of the cameras currently in `state`.
    pub async fn pipelines_in(&self, state: StreamState) -> Vec<(CameraId, Arc<Mutex<CameraPipeline>>)> {
        self.cameras
            .read()
            .await
            .iter()
            .filter(|(_, handle)| handle.health().state == state)
            .map(|(id, handle)| (id.clone(), handle.pipeline()))
            .collect()
    }

    /// Camera count for every stream state, zeros included.
    pub async fn state_counts(&self) -> Vec<(StreamState, usize)> {
        let cameras = self.cameras.read().await;
        ALL_STATES
            .iter()
            .map(|state| {
                let count = cameras
                    .values()
                    .filter(|handle| handle.health().state == *state)
                    .count();
                (*state, count)
            })
            .collect()
    }

    /// Stop every supervisor.
    pub async fn shutdown_all(&self) {
        let handles: Vec<SupervisorHandle> = self.cameras.write().await.drain().map(|(_, h)| h).collect();
        if handles.is_empty() {
            return;
        }

        info!(cameras = handles.len(), "Stopping camera supervisors");
        let timeout = self.config.shutdown_timeout;
        join_all(handles.into_iter().map(|handle| handle.shutdown(timeout))).await;
    }

    async fn view(&self, handle: &SupervisorHandle) -> CameraStatusView {
        let camera = handle.camera();
        let health = handle.health();
        let calibration = self.calibration.get(&camera.id).await;
        let (people_count, counts) = {
            let pipeline = handle.pipeline();
            let pipeline = pipeline.lock().await;
            (pipeline.people_count(), pipeline.count())
        };

        let endpoint = match normalize_endpoint(&camera.stream_url, camera.http_port) {
            Ok(endpoint) => endpoint.to_string(),
            Err(e) => {
                warn!(camera_id = %camera.id, error = %e, "Stored camera has an invalid endpoint");
                String::new()
            }
        };
        let calibrated = calibration.is_calibrated();

        CameraStatusView {
            id: camera.id.clone(),
            name: camera.name.clone(),
            endpoint,
            status: health.state.camera_status(),
            state: health.state,
            attempt: health.attempt,
            max_attempts: camera.options.max_reconnect_attempts,
            next_delay_ms: health.next_delay_ms,
            last_frame_at: health.last_frame_at,
            consecutive_failures: health.consecutive_failures,
            recommended_actions: recommended_actions(&health, calibrated),
            last_error: health.last_error,
            generation: health.generation,
            calibrated,
            calibration_version: calibration.version,
            people_count,
            counts,
        }
    }
}

fn validate_camera(camera: &Camera) -> WorkerResult<()> {
    if camera.id.as_str().trim().is_empty() {
        return Err(WorkerError::invalid_camera("camera id must not be empty"));
    }
    if camera.width == 0 || camera.height == 0 {
        return Err(WorkerError::invalid_camera("camera resolution must be positive"));
    }
    camera.options.validate()?;
    normalize_endpoint(&camera.stream_url, camera.http_port)?;
    Ok(())
}
