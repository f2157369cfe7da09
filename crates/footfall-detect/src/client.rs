//! Detection service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, warn};

use footfall_stream::Frame;

use crate::adapter::Detector;
use crate::error::{DetectError, DetectResult};
use crate::types::{DetectResponse, HealthResponse};

/// Configuration for the detection client.
#[derive(Debug, Clone)]
pub struct DetectClientConfig {
    /// Base URL of the detection service
    pub base_url: String,
    /// Per-call timeout
    pub timeout: Duration,
}

impl Default for DetectClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_millis(5000),
        }
    }
}

impl DetectClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("DETECTION_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            timeout: Duration::from_millis(
                std::env::var("DETECTION_SERVICE_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
            ),
        }
    }
}

/// Client for the external detection service.
pub struct DetectionClient {
    http: Client,
    config: DetectClientConfig,
}

impl DetectionClient {
    /// Create a new detection client.
    pub fn new(config: DetectClientConfig) -> DetectResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> DetectResult<Self> {
        Self::new(DetectClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> DetectError {
        if e.is_timeout() {
            DetectError::Timeout(self.config.timeout.as_millis() as u64)
        } else if e.is_connect() {
            DetectError::service(format!("unreachable: {}", e))
        } else {
            DetectError::Network(e)
        }
    }
}

#[async_trait]
impl Detector for DetectionClient {
    /// Upload one frame and return the raw detections.
    async fn detect(&self, frame: &Frame) -> DetectResult<DetectResponse> {
        let url = format!("{}/detect", self.config.base_url);

        let part = Part::bytes(frame.data.clone())
            .file_name(format!("frame-{}.jpg", frame.sequence))
            .mime_str(&frame.content_type)
            .map_err(DetectError::Network)?;
        let form = Form::new().part("file", part);

        debug!(
            camera_id = %frame.camera_id,
            sequence = frame.sequence,
            bytes = frame.len(),
            "Sending frame to detection service"
        );

        let response = self
            .http
            .post(&url)
            .header("X-Camera-ID", frame.camera_id.as_str())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectError::service(format!(
                "detection service returned {}: {}",
                status, body
            )));
        }

        let body = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        let parsed: DetectResponse = serde_json::from_slice(&body)?;
        Ok(parsed)
    }

    /// Check if the detection service is healthy.
    async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => health.status == "healthy" || health.status == "ok",
                    Err(e) => {
                        warn!("Detection service health response invalid: {}", e);
                        false
                    }
                }
            }
            Ok(response) => {
                warn!("Detection service health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Detection service health check error: {}", e);
                false
            }
        }
    }
}
