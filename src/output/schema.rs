//! JSON schema of the analysis report.
//!
//! Schema is versioned to allow future evolution.

use crate::aggregator::{Correlation, RunSample, RunSeries};
use crate::utils::config::SCHEMA_VERSION;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Top-level report structure written to JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Trace path that was analyzed
    pub trace_path: String,

    /// Number of complete runs found
    pub run_count: usize,

    /// Runtime/stage gap correlation, absent with fewer than two runs or a
    /// constant series
    pub correlation: Option<Correlation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastest: Option<RunSample>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowest: Option<RunSample>,

    /// Every run in encounter order
    pub runs: Vec<RunSample>,

    /// Chart files written alongside the report
    #[serde(default)]
    pub charts: Vec<String>,

    /// RFC 3339 timestamp when the report was generated
    pub generated_at: String,
}

impl AnalysisReport {
    pub fn new(trace_path: impl Into<String>, series: &RunSeries) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            trace_path: trace_path.into(),
            run_count: series.len(),
            correlation: series.correlation().ok(),
            fastest: series.fastest().and_then(|i| series.sample(i)),
            slowest: series.slowest().and_then(|i| series.sample(i)),
            runs: series.samples().collect(),
            charts: Vec::new(),
            generated_at: Utc::now().to_rfc3339(),
        }
    }
}
