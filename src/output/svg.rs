//! SVG chart writer.

use super::prepare_output_path;
use crate::utils::error::OutputError;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const HISTOGRAM_FILE: &str = "runtime_histogram.svg";
pub const SLOWEST_RUN_FILE: &str = "slowest_run.svg";
pub const FASTEST_RUN_FILE: &str = "fastest_run.svg";

/// Path of a chart inside the output directory
pub fn chart_path(output_dir: &Path, file_name: &str) -> PathBuf {
    output_dir.join(file_name)
}

/// Write SVG content to a file
///
/// **Public** - main entry point for chart output
///
/// # Arguments
/// * `svg_content` - Document from one of the chart generators
/// * `output_path` - Path to output SVG file
///
/// # Errors
/// * `OutputError::InvalidPath` - Path is empty, a directory, or its
///   parent cannot be created
/// * `OutputError::InvalidContent` - Content is not a complete SVG document
/// * `OutputError::WriteFailed` - I/O error during write
///
/// # Example
/// ```ignore
/// let svg = generate_histogram(series.histogram_dataset(), 50, &config)?;
/// write_svg(&svg, "artifacts/runtime_histogram.svg")?;
/// ```
pub fn write_svg(svg_content: &str, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    validate_svg_content(svg_content)?;
    prepare_output_path(output_path, "svg")?;

    let mut writer = BufWriter::new(File::create(output_path)?);
    writer.write_all(svg_content.as_bytes())?;
    writer.flush()?;

    info!(
        "Wrote {} ({:.2} KB)",
        output_path.display(),
        svg_content.len() as f64 / 1024.0
    );
    Ok(())
}

/// Reject content that is not a complete SVG document
fn validate_svg_content(svg_content: &str) -> Result<(), OutputError> {
    let trimmed = svg_content.trim();
    if !trimmed.starts_with("<svg") || !trimmed.ends_with("</svg>") {
        return Err(OutputError::InvalidContent(
            "not a complete SVG document".to_string(),
        ));
    }
    Ok(())
}
