//! HTTP client for the persistence API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::debug;

use footfall_models::{AnalyticsReport, CalibrationLine, CalibrationSnapshot, CameraId, Zone};

use crate::error::{StoreError, StoreResult};
use crate::sink::{AnalyticsSink, CalibrationSink};

/// Configuration for the persistence client.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Base URL of the persistence API; `None` disables persistence
    pub base_url: Option<String>,
    /// Bearer token sent with every request
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout: Duration::from_millis(5000),
        }
    }
}

impl PersistenceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("PERSISTENCE_API_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim_end_matches('/').to_string()),
            token: std::env::var("PERSISTENCE_API_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
            timeout: Duration::from_millis(
                std::env::var("PERSISTENCE_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
            ),
        }
    }
}

/// Body of `PUT /cameras/{id}/calibration`.
#[derive(Debug, Serialize)]
struct CalibrationPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<&'a CalibrationLine>,
    zones: &'a [Zone],
}

/// Client for the persistence API.
#[derive(Clone)]
pub struct PersistenceClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl PersistenceClient {
    pub fn new(base_url: impl Into<String>, config: &PersistenceConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(StoreError::Network)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Build a client when a base URL is configured.
    pub fn from_config(config: &PersistenceConfig) -> StoreResult<Option<Self>> {
        config
            .base_url
            .as_deref()
            .map(|url| Self::new(url, config))
            .transpose()
    }

    fn camera_url(&self, camera_id: &CameraId, resource: &str) -> String {
        format!("{}/cameras/{}/{}", self.base_url, camera_id, resource)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(url: &str, response: Response) -> StoreResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::from_http_status(
            status.as_u16(),
            format!("{} failed: {}", url, body),
        ))
    }
}

#[async_trait]
impl CalibrationSink for PersistenceClient {
    async fn save_calibration(
        &self,
        camera_id: &CameraId,
        snapshot: &CalibrationSnapshot,
    ) -> StoreResult<()> {
        let url = self.camera_url(camera_id, "calibration");
        let payload = CalibrationPayload {
            line: snapshot.line.as_ref(),
            zones: &snapshot.zones,
        };

        debug!(camera_id = %camera_id, version = snapshot.version, "Persisting calibration");
        let response = self
            .authorize(self.http.put(&url))
            .json(&payload)
            .send()
            .await?;
        Self::check(&url, response).await
    }
}

#[async_trait]
impl AnalyticsSink for PersistenceClient {
    async fn submit_analytics(
        &self,
        camera_id: &CameraId,
        report: &AnalyticsReport,
    ) -> StoreResult<()> {
        let url = self.camera_url(camera_id, "analytics");
        let response = self
            .authorize(self.http.post(&url))
            .json(report)
            .send()
            .await?;
        Self::check(&url, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use footfall_models::{DensityLevel, EntryDirection, HeatStats, Point, ZoneType};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, token: Option<&str>) -> PersistenceClient {
        let config = PersistenceConfig {
            base_url: Some(server.uri()),
            token: token.map(str::to_string),
            timeout: Duration::from_secs(2),
        };
        PersistenceClient::from_config(&config).unwrap().unwrap()
    }

    fn report() -> AnalyticsReport {
        AnalyticsReport {
            people_count: 4,
            entries: 9,
            exits: 5,
            occupancy: 4,
            density_level: DensityLevel::Low,
            zone_snapshots: vec![],
            heat_stats: HeatStats::default(),
            heatmap_grid: None,
            calibrated: true,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_disabled_without_url() {
        let config = PersistenceConfig::default();
        assert!(PersistenceClient::from_config(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_calibration() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/cameras/cam-1/calibration"))
            .and(header("authorization", "Bearer s3cret"))
            .and(body_partial_json(serde_json::json!({
                "line": {"x1": 0.0, "y1": 360.0, "x2": 1280.0, "y2": 360.0, "direction": "up_to_down"},
                "zones": [{"name": "Door", "type": "entrance"}]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = CalibrationSnapshot {
            line: Some(CalibrationLine::new(
                Point::new(0.0, 360.0),
                Point::new(1280.0, 360.0),
                EntryDirection::UpToDown,
            )),
            zones: vec![Zone::new(
                "Door",
                ZoneType::Entrance,
                vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)],
            )],
            version: 1,
            committed_at: Some(Utc::now()),
        };

        client(&server, Some("s3cret"))
            .save_calibration(&CameraId::from("cam-1"), &snapshot)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_post_analytics_uses_wire_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cameras/cam-1/analytics"))
            .and(body_partial_json(serde_json::json!({
                "peopleCount": 4,
                "entries": 9,
                "exits": 5,
                "densityLevel": "low",
                "zoneSnapshots": []
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, None)
            .submit_analytics(&CameraId::from("cam-1"), &report())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .submit_analytics(&CameraId::from("cam-1"), &report())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("maintenance"));
    }
}
