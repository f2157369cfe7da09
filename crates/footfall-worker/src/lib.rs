//! Camera supervision and analytics publishing.
//!
//! This crate provides:
//! - Reconnect policy and the stream health state machine
//! - The per-camera supervisor task (frame pump, detection ticks, health checks)
//! - The camera fleet registry (register, remove, refresh, status)
//! - The periodic analytics publisher

pub mod backoff;
pub mod config;
pub mod error;
pub mod fleet;
pub mod health;
pub mod metrics;
pub mod pipeline;
pub mod publisher;
pub mod retry;
pub mod status;
pub mod supervisor;

pub use backoff::ReconnectPolicy;
pub use config::{load_cameras_file, CameraSpec, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use fleet::CameraFleet;
pub use health::{FailureDirective, HealthMachine};
pub use pipeline::CameraPipeline;
pub use publisher::{AnalyticsPublisher, PublishSummary};
pub use status::CameraStatusView;
pub use supervisor::{SupervisorCommand, SupervisorContext, SupervisorHandle};
