use crate::parser::TraceFormat;
use crate::utils::config::{load_config, AnalysisConfig, DEFAULT_OUTPUT_DIR};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Arguments for the analyze command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeArgs {
    /// Trace directory or text dump
    pub trace_path: PathBuf,

    /// How to read `trace_path`
    pub format: TraceFormat,

    /// Directory for the SVG charts
    pub output_dir: PathBuf,

    /// Optional TOML analysis config
    pub config_path: Option<PathBuf>,

    /// Optional JSON report path
    pub report_path: Option<PathBuf>,

    /// Overrides for the config file values
    pub bins: Option<usize>,
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub seq_runtime: Option<u64>,

    /// Print the per-run table to stdout
    pub print_summary: bool,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            trace_path: PathBuf::new(),
            format: TraceFormat::Auto,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            config_path: None,
            report_path: None,
            bins: None,
            width: None,
            height: None,
            seq_runtime: None,
            print_summary: false,
        }
    }
}

impl AnalyzeArgs {
    /// Config file (or defaults) with command line overrides applied
    pub fn resolve_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config_path {
            Some(path) => load_config(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => AnalysisConfig::default(),
        };

        if let Some(bins) = self.bins {
            config.charts.histogram_bins = bins;
        }
        if let Some(width) = self.width {
            config.charts.width = width;
        }
        if let Some(height) = self.height {
            config.charts.height = height;
        }
        if self.seq_runtime.is_some() {
            config.charts.seq_runtime_ns = self.seq_runtime;
        }

        config.validate().context("Invalid analysis settings")?;
        Ok(config)
    }
}

/// Validate analyze arguments
///
/// **Public** - can be called before execute_analysis for early validation
pub fn validate_args(args: &AnalyzeArgs) -> Result<()> {
    if args.trace_path.as_os_str().is_empty() {
        anyhow::bail!("Trace path cannot be empty");
    }

    if !args.trace_path.exists() {
        anyhow::bail!("Trace path does not exist: {}", args.trace_path.display());
    }

    if args.output_dir.is_file() {
        anyhow::bail!(
            "Output directory is a file: {}",
            args.output_dir.display()
        );
    }

    if args.bins == Some(0) {
        anyhow::bail!("bins must be greater than 0");
    }

    if args.seq_runtime == Some(0) {
        anyhow::bail!("seq_runtime must be greater than 0");
    }

    Ok(())
}
