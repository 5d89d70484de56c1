//! Chart rendering.
//!
//! This module renders analysis results as standalone SVG documents:
//! - A broken-bar timeline of one run's stage 1 and stage 3 chunk intervals
//! - A histogram of run times

pub mod histogram;
pub mod svg;
pub mod timeline;

use crate::utils::config::{DEFAULT_CHART_HEIGHT, DEFAULT_CHART_WIDTH};

// Re-export main types
pub use histogram::{generate_histogram, Histogram};
pub use timeline::generate_timeline;

/// Chart configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub title: String,
    pub width: usize,
    pub height: usize,
    /// Sequential baseline runtime in ns, drawn as a dashed line on timelines
    pub seq_runtime: Option<u64>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            width: DEFAULT_CHART_WIDTH,
            height: DEFAULT_CHART_HEIGHT,
            seq_runtime: None,
        }
    }
}

impl ChartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_seq_runtime(mut self, seq_runtime: Option<u64>) -> Self {
        self.seq_runtime = seq_runtime;
        self
    }
}
