//! Analyze command implementation.
//!
//! Orchestrates the full pipeline: trace reading → run windows → metrics →
//! charts → optional report.

use super::models::AnalyzeArgs;
use crate::aggregator::{measure_runs, scan_window, Correlation, RunSample, RunSeries};
use crate::chart::{generate_histogram, generate_timeline, ChartConfig};
use crate::output::{
    chart_path, format_run_table, write_report, write_svg, AnalysisReport, FASTEST_RUN_FILE,
    HISTOGRAM_FILE, SLOWEST_RUN_FILE,
};
use crate::parser::{event::Event, load_trace};
use crate::utils::config::AnalysisConfig;
use crate::utils::error::StatsError;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Instant;

/// Everything the analyze command produced
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub series: RunSeries,
    pub correlation: Correlation,
    pub fastest: RunSample,
    pub slowest: RunSample,
    /// Chart files written, in write order
    pub charts: Vec<PathBuf>,
}

/// Undefined correlations print as `nan`
pub fn correlation_line(correlation: &Correlation) -> String {
    if correlation.is_defined() {
        format!(
            "correlation of runtimes to stage gaps is {:.6}",
            correlation.coefficient
        )
    } else {
        "correlation of runtimes to stage gaps is nan".to_string()
    }
}

pub fn run_line(label: &str, run: &RunSample) -> String {
    format!(
        "{} runtime was {} at timestamp {} (run {})",
        label, run.runtime, run.start_time, run.index
    )
}

/// Execute the analyze command
///
/// **Public** - main entry point for the analyze command
///
/// # Arguments
/// * `args` - Command arguments
///
/// # Returns
/// The measured series and the written chart paths
///
/// # Errors
/// * Trace reading errors
/// * Scan errors (missing fields, unmatched chunks, non-positive runtimes)
/// * Fewer than two complete runs
/// * Chart rendering or file write errors
pub fn execute_analysis(args: AnalyzeArgs) -> Result<AnalysisOutcome> {
    let start_time = Instant::now();

    info!("Analyzing trace: {}", args.trace_path.display());

    // Step 1: Resolve configuration
    info!("Step 1/6: Resolving configuration...");
    let config = args.resolve_config()?;
    debug!("Event names: {:?}", config.events);

    // Step 2: Read trace
    info!("Step 2/6: Reading trace...");
    let events = load_trace(&args.trace_path, args.format)
        .with_context(|| format!("Failed to read trace {}", args.trace_path.display()))?;
    info!("Read {} events", events.len());

    // Step 3: Measure runs
    info!("Step 3/6: Measuring runs...");
    let series = measure_runs(&events, &config).context("Failed to measure runs")?;
    if series.is_empty() {
        anyhow::bail!(
            "No complete runs found (expected {} ... {} markers)",
            config.events.run_start,
            config.events.run_stop
        );
    }
    info!("Measured {} runs", series.len());

    // Step 4: Statistics
    info!("Step 4/6: Computing statistics...");
    let correlation = match series.correlation() {
        Ok(correlation) => correlation,
        Err(StatsError::ConstantInput) => {
            warn!("Runtimes or stage gaps are constant, correlation is undefined");
            Correlation::undefined()
        }
        Err(e) => return Err(e).context("Failed to correlate runtimes with stage gaps"),
    };
    debug!("Correlation p-value: {:.6}", correlation.p_value);

    let fastest = series
        .fastest()
        .and_then(|i| series.sample(i))
        .context("No fastest run")?;
    let slowest = series
        .slowest()
        .and_then(|i| series.sample(i))
        .context("No slowest run, the warmup run is excluded")?;

    println!("{}", correlation_line(&correlation));
    println!("{}", run_line("fastest", &fastest));
    println!("{}", run_line("slowest", &slowest));

    // Step 5: Charts
    info!("Step 5/6: Rendering charts...");
    let mut charts = Vec::with_capacity(3);

    if let Some(path) = write_histogram(&series, &config, &args)? {
        charts.push(path);
    }

    for (run, title, file_name) in [
        (&slowest, "Slowest Run", SLOWEST_RUN_FILE),
        (&fastest, "Fastest Run", FASTEST_RUN_FILE),
    ] {
        let path = write_run_timeline(&events, &series, run, title, file_name, &config, &args)?;
        charts.push(path);
    }

    let outcome = AnalysisOutcome {
        series,
        correlation,
        fastest,
        slowest,
        charts,
    };

    // Step 6: Report
    info!("Step 6/6: Writing report...");
    if let Some(report_path) = &args.report_path {
        let mut report = AnalysisReport::new(args.trace_path.display().to_string(), &outcome.series);
        report.charts = outcome
            .charts
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        write_report(&report, report_path)
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
    } else {
        debug!("No report requested");
    }

    if args.print_summary {
        println!("\n{}", format_run_table(&outcome.series));
    }

    let elapsed = start_time.elapsed();
    info!("✓ Analysis complete in {:.2}s", elapsed.as_secs_f64());

    Ok(outcome)
}

/// Render the runtime distribution, skipped when only the warmup run exists
fn write_histogram(
    series: &RunSeries,
    config: &AnalysisConfig,
    args: &AnalyzeArgs,
) -> Result<Option<PathBuf>> {
    let dataset = series.histogram_dataset();
    if dataset.is_empty() {
        warn!("Runtime histogram skipped: no runs after the warmup run");
        return Ok(None);
    }

    let chart_config = ChartConfig::new()
        .with_title("Runtime Distribution")
        .with_size(config.charts.width, config.charts.height);
    let svg = generate_histogram(dataset, config.charts.histogram_bins, &chart_config)
        .context("Failed to render runtime histogram")?;

    let path = chart_path(&args.output_dir, HISTOGRAM_FILE);
    write_svg(&svg, &path).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(Some(path))
}

/// Re-scan one run's window and render its chunk timeline
fn write_run_timeline(
    events: &[Event],
    series: &RunSeries,
    run: &RunSample,
    title: &str,
    file_name: &str,
    config: &AnalysisConfig,
    args: &AnalyzeArgs,
) -> Result<PathBuf> {
    let start_index = series
        .window_start(run.index)
        .with_context(|| format!("Run {} has no recorded window", run.index))?;
    let timeline = scan_window(events, start_index, config)
        .with_context(|| format!("Failed to re-scan run {}", run.index))?;

    let chart_config = ChartConfig::new()
        .with_title(format!("{}: {}ns", title, run.runtime))
        .with_size(config.charts.width, config.charts.height)
        .with_seq_runtime(config.charts.seq_runtime_ns);
    let svg = generate_timeline(&timeline, &chart_config)
        .with_context(|| format!("Failed to render timeline of run {}", run.index))?;

    let path = chart_path(&args.output_dir, file_name);
    write_svg(&svg, &path).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_result_lines() {
        let correlation = Correlation {
            coefficient: 0.123_456_78,
            p_value: 0.5,
        };
        let run = RunSample {
            index: 3,
            start_time: 1_700_000,
            runtime: 4_200,
            stage_gap: 10,
        };

        assert_eq!(
            correlation_line(&correlation),
            "correlation of runtimes to stage gaps is 0.123457"
        );
        assert_eq!(
            run_line("slowest", &run),
            "slowest runtime was 4200 at timestamp 1700000 (run 3)"
        );
    }

    #[test]
    fn test_undefined_correlation_line() {
        assert_eq!(
            correlation_line(&Correlation::undefined()),
            "correlation of runtimes to stage gaps is nan"
        );
    }
}
