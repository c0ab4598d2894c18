//! # drive
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - `.env`、配置与转向模型加载
//! - 为模拟器提供服务直到 Ctrl+C / SIGTERM
//! - `--check` 仅做校验不启动服务

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::Cli;
use commands::{run_bridge, run_check};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "drive starting");

    let result = if cli.check {
        run_check(&cli)
    } else {
        run_bridge(&cli).await
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging (and metrics, when requested) from CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: cli.metrics_port().filter(|_| !cli.check),
        default_log_level: default_log_level.to_string(),
    })
}
