//! Per-run measurements and the series they accumulate into.
//!
//! Each run contributes its start time, runtime, and stage gap. The fastest
//! and slowest runs are picked from these series and later re-scanned by
//! their stored window position.

use super::stats::{pearson, Correlation};
use super::window::{find_run_windows, scan_window, RunWindow};
use crate::parser::event::Event;
use crate::utils::config::{AnalysisConfig, WARMUP_RUNS};
use crate::utils::error::{ScanError, StatsError};
use log::debug;
use serde::{Deserialize, Serialize};

/// Measurements of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSample {
    /// Position of the run in encounter order
    pub index: usize,

    /// Timestamp of the run start marker
    pub start_time: i64,

    /// Stop marker minus start marker, in ns
    pub runtime: i64,

    /// Summed stage 1 stop to stage 3 start gap over all chunks, in ns
    pub stage_gap: i64,
}

/// Accumulated measurements of every run, in encounter order
///
/// The three series always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSeries {
    pub start_times: Vec<i64>,
    pub runtimes: Vec<i64>,
    pub stage_gaps: Vec<i64>,
    /// Event index of each run's start marker
    window_starts: Vec<usize>,
}

impl RunSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, window: &RunWindow, runtime: i64, stage_gap: i64) {
        self.start_times.push(window.start_time);
        self.runtimes.push(runtime);
        self.stage_gaps.push(stage_gap);
        self.window_starts.push(window.start_index);
    }

    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }

    pub fn sample(&self, index: usize) -> Option<RunSample> {
        Some(RunSample {
            index,
            start_time: *self.start_times.get(index)?,
            runtime: *self.runtimes.get(index)?,
            stage_gap: *self.stage_gaps.get(index)?,
        })
    }

    pub fn samples(&self) -> impl Iterator<Item = RunSample> + '_ {
        (0..self.len()).filter_map(|i| self.sample(i))
    }

    /// Event index of a run's start marker, for re-scanning it
    pub fn window_start(&self, index: usize) -> Option<usize> {
        self.window_starts.get(index).copied()
    }

    /// Run with the smallest runtime, the earliest one on ties
    pub fn fastest(&self) -> Option<usize> {
        self.runtimes
            .iter()
            .enumerate()
            .min_by_key(|(_, runtime)| **runtime)
            .map(|(index, _)| index)
    }

    /// Run with the largest runtime after the warmup run, the earliest one
    /// on ties
    pub fn slowest(&self) -> Option<usize> {
        self.runtimes
            .iter()
            .enumerate()
            .skip(WARMUP_RUNS)
            .fold(None, |best: Option<(usize, i64)>, (index, &runtime)| match best {
                Some((_, longest)) if longest >= runtime => best,
                _ => Some((index, runtime)),
            })
            .map(|(index, _)| index)
    }

    /// Runtimes used for the distribution chart, without the warmup run
    pub fn histogram_dataset(&self) -> &[i64] {
        self.runtimes.get(WARMUP_RUNS..).unwrap_or(&[])
    }

    /// Correlation between runtimes and stage gaps
    pub fn correlation(&self) -> Result<Correlation, StatsError> {
        let runtimes: Vec<f64> = self.runtimes.iter().map(|&v| v as f64).collect();
        let gaps: Vec<f64> = self.stage_gaps.iter().map(|&v| v as f64).collect();
        pearson(&runtimes, &gaps)
    }
}

/// Measure every complete run in `events`
///
/// **Public** - main entry point for metrics calculation
///
/// # Errors
/// Any scan error of a run aborts the measurement, as does a run whose
/// stop marker does not come after its start marker
pub fn measure_runs(events: &[Event], config: &AnalysisConfig) -> Result<RunSeries, ScanError> {
    let mut series = RunSeries::new();

    for window in find_run_windows(events, &config.events) {
        let timeline = scan_window(events, window.start_index, config)?;
        let runtime = window.runtime()?;
        let stage_gap = timeline.stage_gap_sum();
        debug!(
            "Run {}: start {} runtime {}ns stage gap {}ns",
            series.len(),
            window.start_time,
            runtime,
            stage_gap
        );
        series.push(&window, runtime, stage_gap);
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_of(runtimes: &[i64]) -> RunSeries {
        let mut series = RunSeries::new();
        for (i, &runtime) in runtimes.iter().enumerate() {
            let window = RunWindow {
                start_index: i * 2,
                stop_index: i * 2 + 1,
                start_time: i as i64 * 1000,
                stop_time: i as i64 * 1000 + runtime,
            };
            series.push(&window, runtime, runtime / 2);
        }
        series
    }

    #[test]
    fn test_fastest_and_slowest() {
        let series = series_of(&[10, 2, 2, 7]);
        assert_eq!(series.fastest(), Some(1));
        assert_eq!(series.slowest(), Some(3));
    }

    #[test]
    fn test_slowest_skips_warmup_and_keeps_first_tie() {
        let series = series_of(&[100, 5, 9, 9]);
        assert_eq!(series.slowest(), Some(2));
        assert_eq!(series.fastest(), Some(1));
    }

    #[test]
    fn test_single_run_has_no_slowest() {
        let series = series_of(&[4]);
        assert_eq!(series.fastest(), Some(0));
        assert_eq!(series.slowest(), None);
        assert!(series.histogram_dataset().is_empty());
    }

    #[test]
    fn test_histogram_dataset_drops_first() {
        let series = series_of(&[5, 1, 9, 3]);
        assert_eq!(series.histogram_dataset(), &[1, 9, 3]);
        assert!(RunSeries::new().histogram_dataset().is_empty());
    }

    #[test]
    fn test_sample_and_window_start() {
        let series = series_of(&[5, 1]);
        assert_eq!(
            series.sample(1),
            Some(RunSample {
                index: 1,
                start_time: 1000,
                runtime: 1,
                stage_gap: 0,
            })
        );
        assert_eq!(series.window_start(1), Some(2));
        assert_eq!(series.sample(2), None);
        assert_eq!(series.samples().count(), 2);
    }
}
