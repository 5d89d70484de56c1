//! Exscan Trace CLI
//!
//! Reads an LTTng trace of parallel exclusive scan benchmark runs and reports
//! how run time relates to the gap between the scan's first and third stages.

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;

use exscan_trace::commands::{execute_analysis, validate_args, AnalyzeArgs};
use exscan_trace::parser::TraceFormat;
use exscan_trace::utils::config::DEFAULT_OUTPUT_DIR;

/// Exscan Trace - chunk timeline analysis for exclusive scan benchmarks
#[derive(Parser, Debug)]
#[command(name = "exscan-trace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// CTF trace directory or babeltrace text dump
    trace_path: PathBuf,

    /// Directory for the SVG charts
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Sequential baseline runtime in ns, drawn on the run timelines
    #[arg(long, env = "EXSCAN_SEQ_RUNTIME")]
    seq_runtime: Option<u64>,

    /// TOML analysis config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input format of the trace path
    #[arg(long, value_enum, default_value_t = TraceFormat::Auto)]
    format: TraceFormat,

    /// Write a JSON analysis report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Number of histogram bins
    #[arg(long)]
    bins: Option<usize>,

    /// Chart width in pixels
    #[arg(long)]
    width: Option<usize>,

    /// Chart height in pixels
    #[arg(long)]
    height: Option<usize>,

    /// Print a per-run table to stdout
    #[arg(long)]
    summary: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let args = AnalyzeArgs {
        trace_path: cli.trace_path,
        format: cli.format,
        output_dir: cli.output_dir,
        config_path: cli.config,
        report_path: cli.report,
        bins: cli.bins,
        width: cli.width,
        height: cli.height,
        seq_runtime: cli.seq_runtime,
        print_summary: cli.summary,
    };

    // Validate args first
    validate_args(&args)?;

    execute_analysis(args)?;

    Ok(())
}
