//! Exscan Trace
//!
//! Analysis of LTTng traces recorded while benchmarking a parallel exclusive
//! scan. Each benchmark run is bracketed by start/stop markers; inside a run
//! every chunk of the input emits start/stop events per scan stage.
//!
//! The crate reads the trace (CTF directories or babeltrace text dumps),
//! measures every run, correlates run time with the stage 1 to stage 3 gap,
//! and renders SVG timelines of the fastest and slowest runs together with a
//! runtime histogram.
//!
//! ## Getting Started
//!
//! ```bash
//! exscan-trace --seq-runtime 301670 ~/lttng-traces/exscan-session
//! ```
//!
//! The library entry points mirror the pipeline:
//! [`parser::load_trace`] → [`aggregator::measure_runs`] →
//! [`chart::generate_timeline`] / [`chart::generate_histogram`] →
//! [`output::write_svg`].

pub mod aggregator;
pub mod chart;
pub mod commands;
pub mod output;
pub mod parser;
pub mod utils;
