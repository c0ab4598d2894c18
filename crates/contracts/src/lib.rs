//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the bridge.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data flow
//! - `Telemetry` arrives from the simulator
//! - the preprocessor turns its camera image into a `ModelInput`
//! - a `SteeringModel` predicts the steering angle
//! - `ThrottlePolicy` picks the throttle, and a `SteerCommand` goes back out
//! - optionally a `DriveRecord` is handed to the recorder

mod config;
mod error;
mod frame;
mod model;
mod record;
mod telemetry;

pub use config::*;
pub use error::*;
pub use frame::*;
pub use model::SteeringModel;
pub use record::*;
pub use telemetry::*;
