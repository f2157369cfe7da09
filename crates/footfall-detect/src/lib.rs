//! Object detection for camera frames.
//!
//! This crate provides a client for the external detection service and the
//! adapter that turns its raw output into filtered, canonical-space
//! detections. The detection model itself is a black box; calls are never
//! retried here, a failed cycle is simply skipped by the caller.

pub mod adapter;
pub mod client;
pub mod error;
pub mod types;

pub use adapter::{DetectionAdapter, DetectionFilter, Detector};
pub use client::{DetectClientConfig, DetectionClient};
pub use error::{DetectError, DetectResult};
pub use types::{DetectResponse, RawDetection};
