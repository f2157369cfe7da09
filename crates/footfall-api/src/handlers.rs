//! Request handlers.

pub mod calibration;
pub mod cameras;
pub mod health;

pub use calibration::*;
pub use cameras::*;
pub use health::*;
