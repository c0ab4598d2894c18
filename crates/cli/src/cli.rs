//! CLI argument definitions using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// drive - steer a simulator car with a pretrained model
#[derive(Parser, Debug)]
#[command(
    name = "drive",
    author,
    version,
    about = "Drive a simulator car with a pretrained steering model",
    long_about = "Serves the simulator's Socket.IO telemetry stream.\n\n\
                  Every camera frame is cropped, blurred, resized and converted to YUV,\n\
                  run through the model, and answered with a steering angle and throttle."
)]
pub struct Cli {
    /// Path to the model definition (JSON); weights are read from the same
    /// path with the format's extension
    #[arg(value_name = "MODEL")]
    pub model: PathBuf,

    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "DRIVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override bind host from configuration
    #[arg(long, env = "DRIVE_HOST")]
    pub host: Option<String>,

    /// Override bind port from configuration
    #[arg(long, env = "DRIVE_PORT")]
    pub port: Option<u16>,

    /// Record the session (images + driving log) into this directory
    #[arg(long, value_name = "DIR", env = "DRIVE_RECORD")]
    pub record: Option<PathBuf>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "DRIVE_METRICS_PORT")]
    pub metrics_port: u16,

    /// Load configuration and model, run one blank frame, and exit
    #[arg(long)]
    pub check: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, env = "DRIVE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", env = "DRIVE_LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Cli {
    /// Prometheus port, `None` when disabled
    pub fn metrics_port(&self) -> Option<u16> {
        (self.metrics_port != 0).then_some(self.metrics_port)
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
