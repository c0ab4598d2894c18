//! `--check`: verify config and model without serving.

use anyhow::{Context, Result};
use contracts::ModelInput;
use tracing::info;

use super::setup::{build_preprocessor, format_shape, load_config, load_model};
use crate::cli::Cli;

/// Load everything `run` would, push one blank frame through the model, print a summary
pub fn run_check(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let model = load_model(cli)?;
    let preprocessor = build_preprocessor(&config, model.as_ref())?;

    let shape = preprocessor.output_shape();
    let blank = ModelInput::blank(&shape, config.preprocess.color_space);
    let steering = model
        .predict(&blank)
        .context("Model failed on a blank frame")?;

    info!(steering = steering, "Blank frame prediction");

    println!("Model:        {} ({})", model.name(), cli.model.display());
    println!("Input:        {} {:?}", format_shape(&shape), config.preprocess.color_space);
    println!("Blank frame:  steering_angle = {steering}");
    println!("Listen:       {}", config.server.bind_addr());
    println!(
        "Throttle:     {} below speed {}, {} otherwise",
        config.policy.low_speed_throttle,
        config.policy.speed_threshold,
        config.policy.cruise_throttle
    );
    match &config.recording.path {
        Some(path) => println!("Recording:    {}", path.display()),
        None => println!("Recording:    off"),
    }

    Ok(())
}
