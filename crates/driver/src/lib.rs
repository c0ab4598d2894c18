//! # Driver
//!
//! The control loop of the bridge: consumes `ServerEvent`s from the socket
//! server one at a time and answers each telemetry frame with a `steer`
//! command.
//!
//! Decoding, preprocessing and the model forward pass run on tokio's blocking
//! pool. A frame that fails at any step is logged, counted and skipped.

mod driver;
mod error;
mod stats;

pub use driver::{Driver, MANUAL_EVENT, STEER_EVENT};
pub use error::FrameError;
pub use stats::DriverStats;
