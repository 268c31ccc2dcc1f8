//! Command implementations for the Baton CLI.

use crate::output::{self, OutputFormat, ReportTable};
use crate::ENV_CONFIG_PATH;
use anyhow::{Context, Result};
use baton::{Pipeline, PipelineConfig, PipelineReport};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Values given on the command line; `None` keeps the lower layer's value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub capacity: Option<usize>,
    pub items: Option<usize>,
    pub producer_delay_ms: Option<u64>,
    pub consumer_delay_ms: Option<u64>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(items) = self.items {
            config.item_count = items;
        }
        if let Some(delay) = self.producer_delay_ms {
            config.producer_delay_ms = delay;
        }
        if let Some(delay) = self.consumer_delay_ms {
            config.consumer_delay_ms = delay;
        }
    }
}

/// Resolve the effective configuration: defaults, file, environment, flags.
pub fn resolve_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    let path: Option<PathBuf> = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from));

    let mut config = match &path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    overrides.apply(&mut config);
    config.validate()?;

    debug!(?config, "Resolved configuration");
    Ok(config)
}

/// Run the pipeline over `1..=item_count` and report the outcome.
///
/// Returns whether the destination matched the source.
pub fn run(config: PipelineConfig, format: OutputFormat) -> Result<bool> {
    let source: Vec<u64> = (1..=config.item_count as u64).collect();
    let pipeline = Pipeline::new(config)?;
    let report = pipeline.run(source).context("Pipeline run failed")?;

    match format {
        OutputFormat::Json => output::json(&report)?,
        OutputFormat::Human => {
            let config = pipeline.config();
            ReportTable::new()
                .section("pipeline")
                .row("capacity", config.capacity)
                .row("items", config.item_count)
                .row("producer delay", format!("{} ms", config.producer_delay_ms))
                .row("consumer delay", format!("{} ms", config.consumer_delay_ms))
                .section("result")
                .row("produced", report.produced)
                .row("received", report.destination.len())
                .row("high-water mark", report.stats.high_water_mark)
                .row("producer waits", report.stats.full_waits)
                .row("consumer waits", report.stats.empty_waits)
                .row("elapsed", format!("{:.2?}", report.elapsed))
                .print();

            output::verdict(report.integrity_ok);
            for note in run_warnings(config, &report) {
                output::warning(note);
            }
        }
    }

    Ok(report.integrity_ok)
}

/// Notes about a run whose timing did not exercise the blocking paths.
fn run_warnings<T>(config: &PipelineConfig, report: &PipelineReport<T>) -> Vec<String> {
    let mut warnings = Vec::new();
    if report.stats.full_waits == 0 && config.item_count > config.capacity {
        warnings.push(format!(
            "buffer never filled ({} of {} slots used); backpressure was not exercised",
            report.stats.high_water_mark, config.capacity
        ));
    }
    warnings
}

/// Print the effective configuration.
pub fn show_config(config: &PipelineConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => output::json(config),
        OutputFormat::Human => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
