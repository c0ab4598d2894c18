//! Default command: serve the simulator until interrupted.

use anyhow::{Context, Result};
use driver::Driver;
use recorder::Recorder;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::setup::{build_preprocessor, load_config, load_model};
use crate::cli::Cli;
use crate::error::CliError;

/// Load the model, start the Socket.IO server and drive until shutdown
pub async fn run_bridge(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let model = load_model(cli)?;
    let preprocessor = build_preprocessor(&config, model.as_ref())?;

    let recorder =
        Recorder::from_config(&config.recording).context("Failed to set up recording")?;

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| CliError::bind(&addr, e))?;

    let (handle, broadcaster, mut events) =
        socket_server::serve(config.server.clone(), listener).context("Failed to start server")?;

    info!(addr = %handle.local_addr(), "Waiting for the simulator");

    let mut driver = Driver::new(
        model,
        preprocessor,
        config.policy.clone(),
        broadcaster,
        recorder,
    );

    let shutdown_signal = setup_shutdown_signal();

    tokio::select! {
        _ = driver.run(&mut events) => {
            warn!("Server stopped delivering events");
        }
        result = shutdown_signal => {
            result?;
            warn!("Received shutdown signal, stopping...");
        }
    }

    handle.shutdown().await;
    let stats = driver.finish().await;

    info!(
        commands = stats.commands_emitted,
        errors = stats.error_count(),
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Drive finished"
    );
    if !cli.quiet {
        stats.print_summary();
    }

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn setup_shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}
