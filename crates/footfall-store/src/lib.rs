//! Calibration storage and the external persistence boundary.
//!
//! This crate provides:
//! - `CalibrationStore`: per-camera committed snapshots plus private drafts
//! - `CalibrationSink` / `AnalyticsSink`: the persistence seams
//! - `PersistenceClient`: HTTP implementation of both sinks

pub mod calibration;
pub mod client;
pub mod error;
pub mod sink;

pub use calibration::{CalibrationDraft, CalibrationStore};
pub use client::{PersistenceClient, PersistenceConfig};
pub use error::{StoreError, StoreResult};
pub use sink::{AnalyticsSink, CalibrationSink, DiscardSink};
