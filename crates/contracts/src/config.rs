//! BridgeConfig - Config Loader output
//!
//! Every field has a default, so an empty file (or no file) describes the
//! stock setup: listen on 0.0.0.0:4567, NVIDIA-style preprocessing, and the
//! two-level throttle rule.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::ColorSpace;

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct BridgeConfig {
    /// Socket server settings
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    /// Camera preprocessing settings
    #[serde(default)]
    #[validate(nested)]
    pub preprocess: PreprocessConfig,

    /// Throttle rule
    #[serde(default)]
    #[validate(nested)]
    pub policy: ThrottlePolicy,

    /// Drive recording
    #[serde(default)]
    #[validate(nested)]
    pub recording: RecordingConfig,
}

/// Socket server settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Engine.IO heartbeat interval
    #[serde(default = "default_ping_interval_ms")]
    #[validate(range(min = 1))]
    pub ping_interval_ms: u64,

    /// Engine.IO heartbeat timeout
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,

    /// Largest accepted HTTP body / websocket message in bytes
    #[serde(default = "default_max_payload")]
    #[validate(range(min = 1024))]
    pub max_payload: usize,

    /// Capacity of the server → driver event queue
    #[serde(default = "default_event_queue")]
    #[validate(range(min = 1))]
    pub event_queue: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4567
}

fn default_ping_interval_ms() -> u64 {
    25_000
}

fn default_ping_timeout_ms() -> u64 {
    20_000
}

fn default_max_payload() -> usize {
    1_000_000
}

fn default_event_queue() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ping_interval_ms: default_ping_interval_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
            max_payload: default_max_payload(),
            event_queue: default_event_queue(),
        }
    }
}

impl ServerConfig {
    /// `host:port` bind string
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Camera preprocessing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PreprocessConfig {
    /// First image row kept (rows above are sky)
    #[serde(default = "default_crop_top")]
    pub crop_top: u32,

    /// One past the last image row kept (rows below are the car hood)
    #[serde(default = "default_crop_bottom")]
    pub crop_bottom: u32,

    /// Gaussian kernel size; 0 or 1 disables the blur
    #[serde(default = "default_blur_kernel")]
    #[validate(range(max = 31))]
    pub blur_kernel: u32,

    /// Model input width
    #[serde(default = "default_target_width")]
    #[validate(range(min = 1))]
    pub target_width: u32,

    /// Model input height
    #[serde(default = "default_target_height")]
    #[validate(range(min = 1))]
    pub target_height: u32,

    /// Colour space fed to the model
    #[serde(default)]
    pub color_space: ColorSpace,
}

fn default_crop_top() -> u32 {
    50
}

fn default_crop_bottom() -> u32 {
    140
}

fn default_blur_kernel() -> u32 {
    3
}

fn default_target_width() -> u32 {
    200
}

fn default_target_height() -> u32 {
    66
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            crop_top: default_crop_top(),
            crop_bottom: default_crop_bottom(),
            blur_kernel: default_blur_kernel(),
            target_width: default_target_width(),
            target_height: default_target_height(),
            color_space: ColorSpace::default(),
        }
    }
}

/// Fixed throttle rule
///
/// Full throttle below the speed threshold, a gentle cruise throttle above it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct ThrottlePolicy {
    #[serde(default = "default_speed_threshold")]
    #[validate(range(min = 0.0))]
    pub speed_threshold: f64,

    #[serde(default = "default_low_speed_throttle")]
    pub low_speed_throttle: f64,

    #[serde(default = "default_cruise_throttle")]
    pub cruise_throttle: f64,
}

fn default_speed_threshold() -> f64 {
    10.0
}

fn default_low_speed_throttle() -> f64 {
    1.0
}

fn default_cruise_throttle() -> f64 {
    0.2
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            speed_threshold: default_speed_threshold(),
            low_speed_throttle: default_low_speed_throttle(),
            cruise_throttle: default_cruise_throttle(),
        }
    }
}

impl ThrottlePolicy {
    /// Throttle for the reported speed. A NaN speed gets the cruise throttle.
    pub fn throttle_for(&self, speed: f64) -> f64 {
        if speed < self.speed_threshold {
            self.low_speed_throttle
        } else {
            self.cruise_throttle
        }
    }
}

/// Drive recording settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordingConfig {
    /// Output directory; recording is off when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Records buffered before new ones are dropped
    #[serde(default = "default_record_queue")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Also write the preprocessed frame the model saw
    #[serde(default)]
    pub save_model_view: bool,
}

fn default_record_queue() -> usize {
    32
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            path: None,
            queue_capacity: default_record_queue(),
            save_model_view: false,
        }
    }
}

impl RecordingConfig {
    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }
}
