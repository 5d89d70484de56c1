//! Output writers for analysis results.
//!
//! This module handles writing data to disk and the terminal:
//! - SVG charts
//! - JSON analysis reports
//! - Per-run text tables

pub mod json;
pub mod schema;
pub mod summary;
pub mod svg;

use crate::utils::error::OutputError;
use log::debug;
use std::path::Path;

// Re-export main functions
pub use json::{read_report, write_report};
pub use schema::AnalysisReport;
pub use summary::format_run_table;
pub use svg::{chart_path, write_svg, FASTEST_RUN_FILE, HISTOGRAM_FILE, SLOWEST_RUN_FILE};

/// Validate an output path and create its parent directories
///
/// **Private** - shared by the writers
fn prepare_output_path(path: &Path, extension: &str) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    if path.extension().map_or(true, |ext| ext != extension) {
        debug!(
            "File does not have a .{} extension: {}",
            extension,
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}
