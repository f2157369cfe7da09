//! Application state.

use std::sync::Arc;

use tracing::{info, warn};

use footfall_detect::{DetectionAdapter, DetectionClient};
use footfall_store::{
    AnalyticsSink, CalibrationSink, CalibrationStore, DiscardSink, PersistenceClient, PersistenceConfig,
};
use footfall_stream::HttpFrameSource;
use footfall_worker::{CameraFleet, SupervisorContext, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub fleet: Arc<CameraFleet>,
    pub detector: DetectionAdapter,
    pub analytics_sink: Arc<dyn AnalyticsSink>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        fleet: Arc<CameraFleet>,
        detector: DetectionAdapter,
        analytics_sink: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            config,
            fleet,
            detector,
            analytics_sink,
        }
    }

    /// Create application state from environment variables.
    pub async fn from_env(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let worker_config = WorkerConfig::from_env();
        let source = HttpFrameSource::from_env()?;
        let detector = DetectionAdapter::new(Arc::new(DetectionClient::from_env()?));

        let persistence = PersistenceClient::from_config(&PersistenceConfig::from_env())?.map(Arc::new);
        let (calibration_sink, analytics_sink): (Arc<dyn CalibrationSink>, Arc<dyn AnalyticsSink>) =
            match persistence {
                Some(client) => {
                    info!("Persistence API configured");
                    (client.clone(), client)
                }
                None => {
                    warn!("PERSISTENCE_API_URL not set, calibration and analytics stay local");
                    (Arc::new(DiscardSink), Arc::new(DiscardSink))
                }
            };

        let ctx = SupervisorContext {
            source: Arc::new(source),
            detector: detector.clone(),
            max_logged_failures: worker_config.max_logged_failures,
        };
        let calibration = Arc::new(CalibrationStore::with_sink(calibration_sink));
        let fleet = Arc::new(CameraFleet::new(ctx, calibration, worker_config));

        Ok(Self::new(config, fleet, detector, analytics_sink))
    }

    pub fn calibration(&self) -> &Arc<CalibrationStore> {
        self.fleet.calibration()
    }
}
