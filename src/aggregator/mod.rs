//! Aggregation of trace events into per-run measurements.
//!
//! This module transforms the event list into:
//! - Run windows and per-chunk stage timelines
//! - Runtime and stage gap series across runs
//! - The runtime/stage gap correlation

pub mod metrics;
pub mod stats;
pub mod window;

// Re-export main types and functions
pub use metrics::{measure_runs, RunSample, RunSeries};
pub use stats::{pearson, Correlation};
pub use window::{find_run_windows, scan_window, ChunkKey, ChunkTimeline, Interval, RunWindow, StageTimes};
