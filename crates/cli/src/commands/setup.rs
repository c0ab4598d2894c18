//! Startup steps shared by `run` and `--check`.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{BridgeConfig, InputShape, SteeringModel};
use preprocess::Preprocessor;
use tracing::info;

use crate::cli::Cli;
use crate::error::CliError;

/// Load the config file (or defaults) and apply CLI overrides
pub fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    if let Some(path) = &cli.config {
        info!(config = %path.display(), "Loading configuration");
    }

    let mut config = config_loader::ConfigLoader::load_or_default(cli.config.as_deref())
        .with_context(|| match &cli.config {
            Some(path) => format!("Failed to load config from {}", path.display()),
            None => "Default configuration is invalid".to_string(),
        })?;

    apply_overrides(cli, &mut config);
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut BridgeConfig) {
    if let Some(host) = &cli.host {
        info!(host = %host, "Overriding bind host from CLI");
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        info!(port = port, "Overriding bind port from CLI");
        config.server.port = port;
    }
    if let Some(dir) = &cli.record {
        info!(dir = %dir.display(), "Recording requested from CLI");
        config.recording.path = Some(dir.clone());
    }
}

/// Load the steering model named on the command line
pub fn load_model(cli: &Cli) -> Result<Arc<dyn SteeringModel>> {
    if !cli.model.exists() {
        return Err(CliError::model_not_found(&cli.model).into());
    }

    let model = inference::load_model(&cli.model)
        .with_context(|| format!("Failed to load model from {}", cli.model.display()))?;

    info!(
        model = %model.name(),
        input = %format_shape(&model.input_shape()),
        "Model loaded"
    );
    Ok(Arc::from(model))
}

/// Build the preprocessor and make sure its output fits the model
pub fn build_preprocessor(config: &BridgeConfig, model: &dyn SteeringModel) -> Result<Preprocessor> {
    let preprocessor =
        Preprocessor::new(config.preprocess.clone()).context("Invalid preprocessing settings")?;

    let produced = preprocessor.output_shape();
    let expected = model.input_shape();
    if (produced.height, produced.width, produced.channels)
        != (expected.height, expected.width, expected.channels)
    {
        return Err(
            CliError::shape_mismatch(format_shape(&expected), format_shape(&produced)).into(),
        );
    }

    Ok(preprocessor)
}

pub fn format_shape(shape: &InputShape) -> String {
    format!("{}x{}x{}", shape.height, shape.width, shape.channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use inference::ConstantModel;
    use std::path::PathBuf;

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::try_parse_from([
            "drive",
            "--host",
            "127.0.0.1",
            "--port",
            "4600",
            "--record",
            "out",
            "model.json",
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();
        assert_eq!(config.server.bind_addr(), "127.0.0.1:4600");
        assert_eq!(config.recording.path, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_config_file_then_cli_override() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "[server]\nport = 5000\nhost = \"10.0.0.1\"\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from(["drive", "-c", &path, "--port", "5001", "m.json"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 5001);
    }

    #[test]
    fn test_invalid_config_file() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "[preprocess]\nblur_kernel = 4\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from(["drive", "--config", &path, "m.json"]).unwrap();
        let err = load_config(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("must be odd"), "got: {err:#}");
    }

    #[test]
    fn test_missing_model() {
        let cli = Cli::try_parse_from(["drive", "/definitely/not/here.json"]).unwrap();
        let err = load_model(&cli).err().unwrap();
        assert!(err.to_string().contains("Model definition not found"));
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let model = ConstantModel::new(0.0).with_shape(InputShape {
            height: 64,
            width: 64,
            ..Default::default()
        });
        let err = build_preprocessor(&BridgeConfig::default(), &model)
            .err()
            .unwrap();
        assert!(err.to_string().contains("64x64x3"), "got: {err}");
    }

    #[test]
    fn test_default_shapes_match() {
        let model = ConstantModel::new(0.0);
        assert!(build_preprocessor(&BridgeConfig::default(), &model).is_ok());
    }
}
