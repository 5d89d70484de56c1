//! Run windows and per-chunk timelines.
//!
//! A run window spans one benchmark execution, from a run start marker to
//! the next run stop marker. Inside a window, chunk start and stop events
//! are indexed by the chunk's offset range and stage.

use crate::parser::event::Event;
use crate::utils::config::{AnalysisConfig, EventNames, FieldNames, EXCLUDED_STAGE, FIRST_STAGE, THIRD_STAGE};
use crate::utils::error::ScanError;
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// Offset range of the input processed by one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ChunkKey {
    pub start_ofs: u64,
    pub stop_ofs: u64,
}

impl ChunkKey {
    pub fn new(start_ofs: u64, stop_ofs: u64) -> Self {
        Self { start_ofs, stop_ofs }
    }
}

/// Closed time interval, in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub start: i64,
    pub stop: i64,
}

impl Interval {
    pub fn duration(&self) -> i64 {
        self.stop - self.start
    }
}

/// Location of one run in the event list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    /// Index of the run start marker
    pub start_index: usize,
    /// Index of the run stop marker
    pub stop_index: usize,
    pub start_time: i64,
    pub stop_time: i64,
}

impl RunWindow {
    /// Wall time of the run, which must be strictly positive
    pub fn runtime(&self) -> Result<i64, ScanError> {
        let runtime = self.stop_time - self.start_time;
        if runtime <= 0 {
            return Err(ScanError::NonPositiveRuntime {
                start: self.start_time,
                stop: self.stop_time,
            });
        }
        Ok(runtime)
    }
}

/// Find every complete run in `events`
///
/// **Public** - events outside a window are skipped, a start marker inside
/// an open window is ignored, and a window left open at the end of the
/// trace is dropped with a warning.
pub fn find_run_windows(events: &[Event], names: &EventNames) -> Vec<RunWindow> {
    let mut windows = Vec::new();
    let mut open: Option<usize> = None;

    for (index, event) in events.iter().enumerate() {
        if event.name == names.run_start {
            match open {
                None => open = Some(index),
                Some(start) => debug!(
                    "Ignoring run start at index {} inside run opened at {}",
                    index, start
                ),
            }
        } else if event.name == names.run_stop {
            if let Some(start) = open.take() {
                windows.push(RunWindow {
                    start_index: start,
                    stop_index: index,
                    start_time: events[start].timestamp,
                    stop_time: event.timestamp,
                });
            }
        }
    }

    if let Some(start) = open {
        warn!(
            "Run starting at event {} (timestamp {}) has no stop marker, dropping it",
            start, events[start].timestamp
        );
    }

    debug!("Found {} run windows", windows.len());
    windows
}

/// Start and stop times of every chunk of one stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTimes {
    pub starts: BTreeMap<ChunkKey, i64>,
    pub stops: BTreeMap<ChunkKey, i64>,
}

impl StageTimes {
    /// Complete interval of a chunk, if both ends were recorded
    pub fn interval(&self, key: &ChunkKey) -> Option<Interval> {
        Some(Interval {
            start: *self.starts.get(key)?,
            stop: *self.stops.get(key)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

/// Chunk timing of one run, relative to the run's first chunk start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkTimeline {
    /// Absolute timestamp of the first chunk start, the window-local zero
    pub base_time: Option<i64>,
    pub stage1: StageTimes,
    pub stage3: StageTimes,
    /// `stop_ofs` of the chunk starting at offset 0
    pub chunk_size: Option<u64>,
    /// Largest `stop_ofs` of any chunk
    pub input_size: Option<u64>,
}

impl ChunkTimeline {
    /// Sum of the idle time between each chunk's stage 1 stop and stage 3 start
    ///
    /// Chunks missing either timestamp are left out of the sum.
    pub fn stage_gap_sum(&self) -> i64 {
        self.stage1
            .stops
            .iter()
            .filter_map(|(key, stop)| self.stage3.starts.get(key).map(|start| start - stop))
            .sum()
    }

    fn stage_mut(&mut self, stage: i64) -> Option<&mut StageTimes> {
        match stage {
            FIRST_STAGE => Some(&mut self.stage1),
            THIRD_STAGE => Some(&mut self.stage3),
            _ => None,
        }
    }
}

/// A chunk event reduced to what the scanner needs
struct ChunkSample {
    key: ChunkKey,
    stage: i64,
}

fn required_field<T>(
    event: &Event,
    field: &str,
    read: impl Fn(&Event, &str) -> Option<T>,
) -> Result<T, ScanError> {
    read(event, field).ok_or_else(|| ScanError::MissingField {
        event: event.name.clone(),
        field: field.to_string(),
        timestamp: event.timestamp,
    })
}

fn chunk_sample(event: &Event, fields: &FieldNames) -> Result<ChunkSample, ScanError> {
    let stage = required_field(event, &fields.stage, Event::get_i64)?;
    if stage == EXCLUDED_STAGE {
        return Ok(ChunkSample {
            key: ChunkKey::new(0, 0),
            stage,
        });
    }
    Ok(ChunkSample {
        key: ChunkKey::new(
            required_field(event, &fields.start_offset, Event::get_u64)?,
            required_field(event, &fields.stop_offset, Event::get_u64)?,
        ),
        stage,
    })
}

/// Index the chunk events of the run starting at `start_index`
///
/// **Public** - consumes events up to and including the next run stop
/// marker
///
/// # Arguments
/// * `events` - Full event list
/// * `start_index` - Index of a run start marker
/// * `config` - Event and field names
///
/// # Errors
/// * `ScanError::NotARunStart` - `start_index` is not a run start marker
/// * `ScanError::UnterminatedRun` - No stop marker follows
/// * `ScanError::MissingField` - A chunk event lacks an integer field
/// * `ScanError::UnmatchedChunkStop` - A chunk stops before it started
pub fn scan_window(
    events: &[Event],
    start_index: usize,
    config: &AnalysisConfig,
) -> Result<ChunkTimeline, ScanError> {
    let names = &config.events;
    if events.get(start_index).map(|e| e.name.as_str()) != Some(names.run_start.as_str()) {
        return Err(ScanError::NotARunStart(start_index));
    }

    let mut timeline = ChunkTimeline::default();
    let mut skipped_stage2 = 0usize;

    for event in &events[start_index + 1..] {
        if event.name == names.run_stop {
            debug!(
                "Run at index {}: {} stage 1 chunks, {} stage 3 chunks, {} stage 2 events skipped",
                start_index,
                timeline.stage1.starts.len(),
                timeline.stage3.starts.len(),
                skipped_stage2
            );
            return Ok(timeline);
        }

        let is_start = event.name == names.chunk_start;
        if !is_start && event.name != names.chunk_stop {
            continue;
        }

        let sample = chunk_sample(event, &config.fields)?;
        if sample.stage == EXCLUDED_STAGE {
            skipped_stage2 += 1;
            continue;
        }
        if sample.stage != FIRST_STAGE && sample.stage != THIRD_STAGE {
            debug!("Ignoring chunk event with stage {}", sample.stage);
            continue;
        }

        if is_start {
            let base = *timeline.base_time.get_or_insert(event.timestamp);
            if sample.key.start_ofs == 0 {
                timeline.chunk_size = Some(sample.key.stop_ofs);
            }
            timeline.input_size = timeline.input_size.max(Some(sample.key.stop_ofs));
            if let Some(stage) = timeline.stage_mut(sample.stage) {
                stage.starts.insert(sample.key, event.timestamp - base);
            }
        } else {
            let base = timeline.base_time;
            let stage = timeline
                .stage_mut(sample.stage)
                .filter(|stage| stage.starts.contains_key(&sample.key));
            match (stage, base) {
                (Some(stage), Some(base)) => {
                    stage.stops.insert(sample.key, event.timestamp - base);
                }
                _ => {
                    return Err(ScanError::UnmatchedChunkStop {
                        start_ofs: sample.key.start_ofs,
                        stop_ofs: sample.key.stop_ofs,
                        stage: sample.stage,
                        timestamp: event.timestamp,
                    })
                }
            }
        }
    }

    Err(ScanError::UnterminatedRun(start_index))
}
