//! Operator HTTP API.
//!
//! This crate provides:
//! - Camera status listing with attempt counts and recommended actions
//! - Camera registration, removal and manual refresh
//! - Calibration editing (draft, commit) and direct line/zone updates
//! - Liveness/readiness probes and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, LogFormat};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
