//! DriveRecord - Recorder input
//!
//! One bridge step: what the simulator sent and what was sent back.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{ModelInput, SteerCommand};

/// One recorded telemetry → command step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveRecord {
    /// Step sequence number (monotonically increasing per run)
    pub sequence: u64,

    /// When the telemetry was received
    pub captured_at: SystemTime,

    /// Camera image exactly as the simulator encoded it
    pub image: Bytes,

    /// Speed reported by the simulator
    pub speed: f64,

    /// Steering angle reported by the simulator
    pub reported_steering: f64,

    /// Throttle reported by the simulator
    pub reported_throttle: f64,

    /// Command that was emitted
    pub command: SteerCommand,

    /// Frame the model saw (only when model-view recording is on)
    #[serde(skip)]
    pub model_view: Option<ModelInput>,
}
