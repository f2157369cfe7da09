//! Camera frame acquisition.
//!
//! This crate provides:
//! - Endpoint normalization (rtsp with inline credentials to plain http)
//! - The `FrameSource` / `FrameStream` seam used by the stream supervisor
//! - An HTTP source handling both snapshot and MJPEG endpoints

pub mod endpoint;
pub mod error;
pub mod frame;
pub mod mjpeg;
pub mod source;

pub use endpoint::{normalize_endpoint, StreamCredentials, StreamEndpoint};
pub use error::{StreamError, StreamResult};
pub use frame::Frame;
pub use source::{FrameSource, FrameStream, HttpFrameSource, HttpSourceConfig};
