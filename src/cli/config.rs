//! Conversion of CLI arguments into an [`UpscaleConfig`]

use crate::cli::main_impl::{Cli, CliOutputFormat};
use crate::{
    config::{OutputFormat, UpscaleConfig, UpscaleConfigBuilder, UpscaleFactor},
    models::{ModelSource, ModelSpec},
    utils::{ConfigValidator, ExecutionProviderManager},
};
use anyhow::{Context, Result};
use std::path::PathBuf;

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Jpeg => Self::Jpeg,
            CliOutputFormat::Webp => Self::WebP,
            CliOutputFormat::Tiff => Self::Tiff,
            CliOutputFormat::Bmp => Self::Bmp,
        }
    }
}

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the run configuration
    ///
    /// Starts from `--config` when given, otherwise from defaults; every
    /// flag the user passed overrides the file.
    pub(crate) fn from_cli(cli: &Cli) -> Result<UpscaleConfig> {
        let base = match &cli.config {
            Some(path) => UpscaleConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => UpscaleConfig::default(),
        };

        let mut model = base.model.clone();
        if let Some(model_arg) = &cli.model {
            model = Some(ModelSpec::new(ModelSource::parse(model_arg)));
        }
        if let (Some(spec), Some(layout)) = (model.as_mut(), cli.layout.as_deref()) {
            spec.layout = layout.parse().context("Invalid tensor layout")?;
        }

        let mut builder = UpscaleConfigBuilder::from_config(base);
        if let Some(spec) = model {
            builder = builder.model(spec);
        }

        if let Some(provider) = &cli.execution_provider {
            let (backend, execution_provider) =
                ExecutionProviderManager::parse_provider_string(provider)
                    .context("Invalid execution provider format")?;
            builder = builder
                .backend(backend)
                .execution_provider(execution_provider);
        }
        if let Some(scale) = cli.scale {
            builder = builder.factor(UpscaleFactor::from_multiplier(scale)?);
        }
        if let Some(format) = cli.format {
            builder = builder.output_format(Some(format.into()));
        }
        if let Some(chunk_size) = cli.chunk_size {
            builder = builder.chunk_size(chunk_size);
        }
        if let Some(pad_size) = cli.pad_size {
            builder = builder.pad_size(pad_size);
        }
        if let Some(workers) = cli.workers {
            builder = builder.workers(workers);
        }
        if let Some(sessions) = cli.sessions {
            builder = builder.sessions(sessions);
        }
        if let Some(timeout_ms) = cli.tile_timeout_ms {
            builder = builder.tile_timeout_ms(Some(timeout_ms));
        }
        if let Some(quality) = cli.jpeg_quality {
            builder = builder.jpeg_quality(quality);
        }
        if let Some(threads) = cli.threads {
            builder = builder.intra_threads(threads);
        }
        if let Some(cache_dir) = &cli.cache_dir {
            builder = builder.cache_dir(Some(PathBuf::from(cache_dir)));
        }

        builder.build().context("Invalid configuration")
    }

    /// Check flags that can be rejected before any file is touched
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(provider) = &cli.execution_provider {
            ExecutionProviderManager::parse_provider_string(provider)
                .context("Invalid execution provider format")?;
        }
        if let Some(quality) = cli.jpeg_quality {
            ConfigValidator::validate_quality("JPEG", quality).context("Invalid quality setting")?;
        }
        if let Some(scale) = cli.scale {
            UpscaleFactor::from_multiplier(scale).context("Invalid scale")?;
        }
        Ok(())
    }
}
