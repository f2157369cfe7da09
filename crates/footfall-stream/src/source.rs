//! Frame sources.
//!
//! A `FrameSource` opens a `FrameStream` for a camera. The HTTP source
//! handles two endpoint shapes:
//! - snapshot endpoints returning one image per GET, polled at the camera's
//!   frame interval
//! - MJPEG endpoints (`multipart/x-mixed-replace`) read as one long response

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use footfall_models::{Camera, CameraId};

use crate::endpoint::{normalize_endpoint, StreamEndpoint};
use crate::error::{StreamError, StreamResult};
use crate::frame::Frame;
use crate::mjpeg::MjpegParser;

/// Opens frame streams for cameras.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Connect to the camera and return a stream of frames.
    async fn open(&self, camera: &Camera) -> StreamResult<Box<dyn FrameStream>>;
}

/// An open camera stream.
#[async_trait]
pub trait FrameStream: Send {
    /// Wait for the next frame.
    async fn next_frame(&mut self) -> StreamResult<Frame>;

    /// Normalized endpoint, without credentials.
    fn endpoint(&self) -> &str;
}

/// Configuration for the HTTP frame source.
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Maximum wait for a response or for the next MJPEG chunk
    pub read_timeout: Duration,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpSourceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            connect_timeout: Duration::from_millis(
                std::env::var("FRAME_CONNECT_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
            ),
            read_timeout: Duration::from_millis(
                std::env::var("FRAME_FETCH_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10_000),
            ),
        }
    }
}

/// Frame source for HTTP snapshot and MJPEG cameras.
#[derive(Clone)]
pub struct HttpFrameSource {
    http: Client,
    config: HttpSourceConfig,
}

impl HttpFrameSource {
    pub fn new(config: HttpSourceConfig) -> StreamResult<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(StreamError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> StreamResult<Self> {
        Self::new(HttpSourceConfig::from_env())
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn open(&self, camera: &Camera) -> StreamResult<Box<dyn FrameStream>> {
        let endpoint = normalize_endpoint(&camera.stream_url, camera.http_port)?;
        if endpoint.rewritten {
            info!(
                camera_id = %camera.id,
                endpoint = %endpoint,
                "Rewrote streaming endpoint to HTTP"
            );
        }

        let read_timeout = self.config.read_timeout;
        let response = send(request(&self.http, &endpoint), read_timeout).await?;

        let is_mjpeg = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("multipart/"))
            .unwrap_or(false);

        let mut stream = FrameBuilder {
            camera_id: camera.id.clone(),
            width: camera.width,
            height: camera.height,
            sequence: 0,
        };

        if is_mjpeg {
            debug!(camera_id = %camera.id, endpoint = %endpoint, "Opened MJPEG stream");
            return Ok(Box::new(MjpegStream {
                endpoint,
                response,
                parser: MjpegParser::new(),
                read_timeout,
                builder: stream,
            }));
        }

        let content_type = content_type(&response);
        let data = read_body(response, read_timeout).await?;
        let first = stream.build(data, content_type);

        let mut interval = tokio::time::interval(camera.options.frame_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Consume the immediate tick; the first frame is already in hand
        interval.tick().await;

        debug!(camera_id = %camera.id, endpoint = %endpoint, "Opened snapshot stream");
        Ok(Box::new(SnapshotStream {
            http: self.http.clone(),
            endpoint,
            interval,
            read_timeout,
            pending: Some(first),
            builder: stream,
        }))
    }
}

struct FrameBuilder {
    camera_id: CameraId,
    width: u32,
    height: u32,
    sequence: u64,
}

impl FrameBuilder {
    fn build(&mut self, data: Vec<u8>, content_type: String) -> Frame {
        self.sequence += 1;
        Frame {
            camera_id: self.camera_id.clone(),
            sequence: self.sequence,
            data,
            content_type,
            width: self.width,
            height: self.height,
            captured_at: Utc::now(),
        }
    }
}

struct SnapshotStream {
    http: Client,
    endpoint: StreamEndpoint,
    interval: Interval,
    read_timeout: Duration,
    pending: Option<Frame>,
    builder: FrameBuilder,
}

#[async_trait]
impl FrameStream for SnapshotStream {
    async fn next_frame(&mut self) -> StreamResult<Frame> {
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }

        self.interval.tick().await;
        let response = send(request(&self.http, &self.endpoint), self.read_timeout).await?;
        let content_type = content_type(&response);
        let data = read_body(response, self.read_timeout).await?;
        Ok(self.builder.build(data, content_type))
    }

    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

struct MjpegStream {
    endpoint: StreamEndpoint,
    response: Response,
    parser: MjpegParser,
    read_timeout: Duration,
    builder: FrameBuilder,
}

#[async_trait]
impl FrameStream for MjpegStream {
    async fn next_frame(&mut self) -> StreamResult<Frame> {
        loop {
            if let Some(jpeg) = self.parser.latest_frame() {
                return Ok(self.builder.build(jpeg, "image/jpeg".to_string()));
            }

            match tokio::time::timeout(self.read_timeout, self.response.chunk()).await {
                Ok(Ok(Some(chunk))) => self.parser.push(&chunk),
                Ok(Ok(None)) => return Err(StreamError::Closed),
                Ok(Err(e)) => return Err(map_reqwest(e, self.read_timeout)),
                Err(_) => return Err(StreamError::Timeout(millis(self.read_timeout))),
            }
        }
    }

    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

fn request(http: &Client, endpoint: &StreamEndpoint) -> RequestBuilder {
    let builder = http.get(endpoint.url.clone());
    match &endpoint.credentials {
        Some(creds) => builder.basic_auth(&creds.username, creds.password.as_ref()),
        None => builder,
    }
}

async fn send(builder: RequestBuilder, read_timeout: Duration) -> StreamResult<Response> {
    let response = tokio::time::timeout(read_timeout, builder.send())
        .await
        .map_err(|_| StreamError::Timeout(millis(read_timeout)))?
        .map_err(|e| map_reqwest(e, read_timeout))?;

    if !response.status().is_success() {
        return Err(StreamError::unavailable(format!(
            "camera returned {}",
            response.status()
        )));
    }

    Ok(response)
}

async fn read_body(response: Response, read_timeout: Duration) -> StreamResult<Vec<u8>> {
    let bytes = tokio::time::timeout(read_timeout, response.bytes())
        .await
        .map_err(|_| StreamError::Timeout(millis(read_timeout)))?
        .map_err(|e| map_reqwest(e, read_timeout))?;

    if bytes.is_empty() {
        return Err(StreamError::unavailable("camera returned an empty frame"));
    }

    Ok(bytes.to_vec())
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string()
}

fn map_reqwest(e: reqwest::Error, read_timeout: Duration) -> StreamError {
    if e.is_timeout() {
        StreamError::Timeout(millis(read_timeout))
    } else if e.is_connect() {
        // Connection errors carry the URL, which may be the rewritten one
        StreamError::unavailable(format!("connection failed: {}", e.without_url()))
    } else {
        StreamError::Network(e.without_url())
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use footfall_models::CameraOptions;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JPEG: &[u8] = &[0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9];

    fn camera(url: String) -> Camera {
        Camera::new("cam-1", url).with_options(CameraOptions {
            frame_interval_ms: 33,
            ..Default::default()
        })
    }

    fn source() -> HttpFrameSource {
        HttpFrameSource::new(HttpSourceConfig {
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_stream_polls_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/snapshot.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(JPEG.to_vec(), "image/jpeg"))
            .expect(2)
            .mount(&server)
            .await;

        let cam = camera(format!("{}/snapshot.jpg", server.uri()));
        let mut stream = source().open(&cam).await.unwrap();

        let first = stream.next_frame().await.unwrap();
        let second = stream.next_frame().await.unwrap();
        assert_eq!(first.data, JPEG);
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.camera_id.as_str(), "cam-1");
    }

    #[tokio::test]
    async fn test_mjpeg_stream_yields_frames_then_closes() {
        let server = MockServer::start().await;
        let mut body = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        body.extend_from_slice(JPEG);
        body.extend_from_slice(b"\r\n");

        Mock::given(method("GET"))
            .and(path("/mjpeg"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                body,
                "multipart/x-mixed-replace; boundary=frame",
            ))
            .mount(&server)
            .await;

        let cam = camera(format!("{}/mjpeg", server.uri()));
        let mut stream = source().open(&cam).await.unwrap();

        let frame = stream.next_frame().await.unwrap();
        assert_eq!(frame.data, JPEG);
        assert!(matches!(stream.next_frame().await, Err(StreamError::Closed)));
    }

    #[tokio::test]
    async fn test_rtsp_credentials_sent_as_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live"))
            .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(JPEG.to_vec(), "image/jpeg"))
            .expect(1)
            .mount(&server)
            .await;

        let address = server.address();
        let url = format!("rtsp://admin:secret@{}:{}/live", address.ip(), address.port());
        let stream = source().open(&camera(url)).await.unwrap();
        assert!(!stream.endpoint().contains("secret"));
        assert!(stream.endpoint().starts_with("http://"));
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = source().open(&camera(server.uri())).await;
        assert!(matches!(result, Err(StreamError::StreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_fails_without_request() {
        let result = source().open(&camera("ftp://cam/x".to_string())).await;
        let err = result.err().unwrap();
        assert!(!err.is_retryable());
    }
}
