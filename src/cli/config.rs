//! Conversion of parsed CLI arguments into a [`ProcessorConfig`]

use crate::cli::main_impl::{Cli, CliStrategy, CliTogglePolicy};
use crate::{
    config::{BlurConfig, BlurStrategy, DetectorConfig, SelectionMode, TogglePolicy},
    models::ModelSource,
    processor::{resolve_output_path, ProcessorConfig, ProcessorConfigBuilder},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Convert CLI arguments to a `ProcessorConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build `ProcessorConfig` from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<ProcessorConfig> {
        let (backend_type, execution_provider) =
            ExecutionProviderManager::parse_provider_string(&cli.execution_provider)
                .context("Invalid execution provider format")?;

        let blur = BlurConfig::builder()
            .strategy(match cli.strategy {
                CliStrategy::Ellipse => BlurStrategy::EllipseMask,
                CliStrategy::Rectangle => BlurStrategy::RectangleOverwrite,
            })
            .kernel_size(cli.kernel_size)
            .toggle_policy(match cli.toggle_policy {
                CliTogglePolicy::All => TogglePolicy::All,
                CliTogglePolicy::First => TogglePolicy::First,
            })
            .build()
            .context("Invalid blur settings")?;

        let detector = DetectorConfig {
            execution_provider,
            confidence_threshold: cli.confidence,
            input_size: cli.input_size,
            ..DetectorConfig::default()
        }
        .with_threads(cli.threads);

        let model_source = cli
            .model
            .clone()
            .map_or_else(ModelSource::default, ModelSource::External);

        ProcessorConfigBuilder::new()
            .mode(if cli.manual {
                SelectionMode::Manual
            } else {
                SelectionMode::Automatic
            })
            .blur(blur)
            .detector(detector)
            .backend_type(backend_type)
            .model_source(model_source)
            .regions_file(cli.regions.clone())
            .export_regions(cli.export_regions.clone())
            .interactive(!cli.no_gui)
            .build()
            .context("Invalid configuration")
    }

    /// Where the blurred image goes
    pub(crate) fn output_path(cli: &Cli) -> PathBuf {
        let input = cli.image.as_deref().unwrap_or_else(|| Path::new("image"));
        resolve_output_path(input, cli.out.as_deref())
    }
}
