//! JSON report writer.

use super::prepare_output_path;
use super::schema::AnalysisReport;
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Write an analysis report to a JSON file
///
/// **Public** - main entry point for JSON output
///
/// # Arguments
/// * `report` - Report to write
/// * `output_path` - Path to output JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
pub fn write_report(report: &AnalysisReport, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    prepare_output_path(output_path, "json")?;

    let writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(writer, report)?;

    info!(
        "Report written to {} ({} bytes)",
        output_path.display(),
        calculate_file_size(output_path)
    );
    Ok(())
}

/// Calculate file size in bytes
fn calculate_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Read a report back from a JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - File read error (I/O errors share this variant)
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_report(input_path: impl AsRef<Path>) -> Result<AnalysisReport, OutputError> {
    let input_path = input_path.as_ref();
    let report: AnalysisReport = serde_json::from_reader(File::open(input_path)?)?;

    debug!(
        "Report loaded: version {}, {} runs from {}",
        report.version, report.run_count, report.trace_path
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{Correlation, RunSample};
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    fn create_test_report() -> AnalysisReport {
        let run = |index, runtime| RunSample {
            index,
            start_time: 1_000 * index as i64,
            runtime,
            stage_gap: runtime / 3,
        };
        AnalysisReport {
            version: "1.0.0".to_string(),
            trace_path: "/tmp/trace".to_string(),
            run_count: 3,
            correlation: Some(Correlation {
                coefficient: 0.5,
                p_value: 0.25,
            }),
            fastest: Some(run(1, 90)),
            slowest: Some(run(2, 120)),
            runs: vec![run(0, 300), run(1, 90), run(2, 120)],
            charts: vec!["artifacts/fastest_run.svg".to_string()],
            generated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_write_and_read_report() {
        let report = create_test_report();
        let temp_file = NamedTempFile::new().unwrap();

        write_report(&report, temp_file.path()).unwrap();
        let loaded = read_report(temp_file.path()).unwrap();

        assert_eq!(loaded, report);
    }

    #[test]
    fn test_optional_runs_are_omitted() {
        let mut report = create_test_report();
        report.slowest = None;
        let text = serde_json::to_string_pretty(&report).unwrap();
        assert!(text.contains("\"fastest\""));
        assert!(!text.contains("\"slowest\""));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/report.json");

        write_report(&create_test_report(), &nested_path).unwrap();

        assert!(nested_path.exists());
    }

    #[test]
    fn test_read_missing_report() {
        assert!(matches!(
            read_report("/nonexistent/report.json"),
            Err(OutputError::WriteFailed(_))
        ));
    }
}
