//! Configuration and constants for the CLI.
//!
//! Defaults match the tracepoints emitted by the exclusive scan benchmark.
//! Any of them can be overridden from a TOML file loaded with [`load_config`].

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current JSON report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Default directory for generated charts
pub const DEFAULT_OUTPUT_DIR: &str = "artifacts";

// Marker events for a single benchmark execution
pub const RUN_START_EVENT: &str = "HPX_ALG:benchmark_exe_start";
pub const RUN_STOP_EVENT: &str = "HPX_ALG:benchmark_exe_stop";

// Per-chunk events emitted by the parallel algorithm
pub const CHUNK_START_EVENT: &str = "HPX:chunk_start";
pub const CHUNK_STOP_EVENT: &str = "HPX:chunk_stop";

pub const START_OFFSET_FIELD: &str = "start_ofs";
pub const STOP_OFFSET_FIELD: &str = "stop_ofs";
pub const STAGE_FIELD: &str = "stage";

/// Stage 2 does a single operation per chunk and is left out of the analysis
pub const FIRST_STAGE: i64 = 1;
pub const EXCLUDED_STAGE: i64 = 2;
pub const THIRD_STAGE: i64 = 3;

/// Number of leading runs treated as cold-start outliers
pub const WARMUP_RUNS: usize = 1;

pub const DEFAULT_HISTOGRAM_BINS: usize = 50;
pub const DEFAULT_CHART_WIDTH: usize = 1200;
pub const DEFAULT_CHART_HEIGHT: usize = 700;

// matplotlib tab10 palette entries used by the charts
pub const STAGE1_COLOR: &str = "#d62728"; // tab:red
pub const STAGE3_COLOR: &str = "#ff7f0e"; // tab:orange
pub const HISTOGRAM_COLOR: &str = "#1f77b4"; // tab:blue
pub const BASELINE_COLOR: &str = "gray";

/// Event names that delimit runs and chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventNames {
    pub run_start: String,
    pub run_stop: String,
    pub chunk_start: String,
    pub chunk_stop: String,
}

impl Default for EventNames {
    fn default() -> Self {
        Self {
            run_start: RUN_START_EVENT.to_string(),
            run_stop: RUN_STOP_EVENT.to_string(),
            chunk_start: CHUNK_START_EVENT.to_string(),
            chunk_stop: CHUNK_STOP_EVENT.to_string(),
        }
    }
}

/// Payload field names carried by chunk events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub start_offset: String,
    pub stop_offset: String,
    pub stage: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            start_offset: START_OFFSET_FIELD.to_string(),
            stop_offset: STOP_OFFSET_FIELD.to_string(),
            stage: STAGE_FIELD.to_string(),
        }
    }
}

/// Chart settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    pub histogram_bins: usize,
    pub width: usize,
    pub height: usize,

    /// Runtime of the sequential algorithm, drawn as a reference line.
    /// Entered by hand, so it can be stale.
    pub seq_runtime_ns: Option<u64>,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            width: DEFAULT_CHART_WIDTH,
            height: DEFAULT_CHART_HEIGHT,
            seq_runtime_ns: None,
        }
    }
}

/// Complete analysis configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub events: EventNames,

    #[serde(default)]
    pub fields: FieldNames,

    #[serde(default)]
    pub charts: ChartSettings,
}

impl AnalysisConfig {
    /// Reject settings the charts cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.charts.histogram_bins == 0 {
            return Err(ConfigError::Invalid(
                "histogram_bins must be greater than 0".to_string(),
            ));
        }
        if self.charts.width < 200 || self.charts.height < 150 {
            return Err(ConfigError::Invalid(format!(
                "chart size {}x{} is too small (min 200x150)",
                self.charts.width, self.charts.height
            )));
        }
        if self.events.run_start == self.events.run_stop {
            return Err(ConfigError::Invalid(
                "run_start and run_stop must be different events".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load an analysis config from a TOML file
///
/// Missing sections and keys fall back to the defaults above.
///
/// # Errors
/// * `ConfigError::Io` - If file cannot be read
/// * `ConfigError::Parse` - If TOML is invalid
/// * `ConfigError::Invalid` - If values are out of range
pub fn load_config(path: impl AsRef<Path>) -> Result<AnalysisConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: AnalysisConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [events]
            chunk_start = "HPX_ALG:chunk_start"

            [charts]
            seq_runtime_ns = 301670
            "#,
        )
        .unwrap();

        assert_eq!(config.events.chunk_start, "HPX_ALG:chunk_start");
        assert_eq!(config.events.chunk_stop, CHUNK_STOP_EVENT);
        assert_eq!(config.fields, FieldNames::default());
        assert_eq!(config.charts.histogram_bins, DEFAULT_HISTOGRAM_BINS);
        assert_eq!(config.charts.seq_runtime_ns, Some(301_670));
    }

    #[test]
    fn test_validate_rejects_zero_bins() {
        let mut config = AnalysisConfig::default();
        config.charts.histogram_bins = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_same_markers() {
        let mut config = AnalysisConfig::default();
        config.events.run_stop = config.events.run_start.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        fs::write(&path, "[fields]\nstage = \"phase\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.fields.stage, "phase");
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        fs::write(&path, "[charts\nhistogram_bins = 3").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }
}
