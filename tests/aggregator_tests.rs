use exscan_trace::aggregator::{find_run_windows, measure_runs, scan_window, ChunkKey, RunSeries, RunWindow};
use exscan_trace::parser::{Event, FieldValue};
use exscan_trace::utils::config::AnalysisConfig;
use exscan_trace::utils::ScanError;
use pretty_assertions::assert_eq;

const RUN_START: &str = "HPX_ALG:benchmark_exe_start";
const RUN_STOP: &str = "HPX_ALG:benchmark_exe_stop";
const CHUNK_START: &str = "HPX:chunk_start";
const CHUNK_STOP: &str = "HPX:chunk_stop";

fn chunk(name: &str, ts: i64, start: u64, stop: u64, stage: i64) -> Event {
    Event::new(name, ts)
        .with_field("start_ofs", FieldValue::Unsigned(start))
        .with_field("stop_ofs", FieldValue::Unsigned(stop))
        .with_field("stage", FieldValue::Signed(stage))
}

/// Run of three 100-element chunks; `gaps[i]` separates chunk i's stage 1
/// stop from its stage 3 start, `None` leaves out its stage 3 events
fn run(t0: i64, runtime: i64, gaps: [Option<i64>; 3]) -> Vec<Event> {
    let mut events = vec![Event::new(RUN_START, t0)];
    for (i, gap) in gaps.iter().enumerate() {
        let (lo, hi) = (i as u64 * 100, (i as u64 + 1) * 100);
        let t = t0 + 10 + i as i64;
        events.push(chunk(CHUNK_START, t, lo, hi, 1));
        events.push(chunk(CHUNK_STOP, t + 20, lo, hi, 1));
        events.push(chunk(CHUNK_START, t + 22, lo, hi, 2));
        events.push(chunk(CHUNK_STOP, t + 25, lo, hi, 2));
        if let Some(gap) = gap {
            events.push(chunk(CHUNK_START, t + 20 + gap, lo, hi, 3));
            events.push(chunk(CHUNK_STOP, t + 30 + gap, lo, hi, 3));
        }
    }
    events.push(Event::new(RUN_STOP, t0 + runtime));
    events.sort_by_key(|e| e.timestamp);
    events
}

fn series_with(runtimes: &[i64]) -> RunSeries {
    let mut series = RunSeries::new();
    for (i, &runtime) in runtimes.iter().enumerate() {
        let window = RunWindow {
            start_index: i * 2,
            stop_index: i * 2 + 1,
            start_time: i as i64 * 1_000,
            stop_time: i as i64 * 1_000 + runtime,
        };
        series.push(&window, runtime, 0);
    }
    series
}

#[test]
fn test_gap_sum_over_keys_in_both_stages() {
    let events = run(1_000, 500, [Some(5), None, Some(40)]);
    let timeline = scan_window(&events, 0, &AnalysisConfig::default()).unwrap();

    assert_eq!(timeline.stage1.stops.len(), 3);
    assert_eq!(timeline.stage3.starts.len(), 2);
    assert_eq!(timeline.stage_gap_sum(), 5 + 40);
    assert_eq!(timeline.chunk_size, Some(100));
    assert_eq!(timeline.input_size, Some(300));
}

#[test]
fn test_stage2_never_recorded() {
    let events = run(0, 500, [Some(5), Some(5), Some(5)]);
    let timeline = scan_window(&events, 0, &AnalysisConfig::default()).unwrap();

    let key = ChunkKey::new(0, 100);
    // Stage 1 starts at 10 relative to the run's first chunk start
    assert_eq!(timeline.stage1.starts.get(&key), Some(&0));
    assert_eq!(timeline.stage1.stops.get(&key), Some(&20));
    assert_eq!(timeline.stage3.starts.get(&key), Some(&25));
    assert!(timeline.stage1.starts.values().all(|&t| t != 22));
    assert!(timeline.stage3.starts.values().all(|&t| t != 22));
}

#[test]
fn test_measure_runs_over_several_windows() {
    let mut events = run(0, 900, [Some(10), Some(10), Some(10)]);
    events.extend(run(10_000, 300, [Some(1), Some(2), Some(3)]));
    events.extend(run(20_000, 600, [Some(4), Some(4), Some(4)]));

    let series = measure_runs(&events, &AnalysisConfig::default()).unwrap();

    assert_eq!(series.start_times, vec![0, 10_000, 20_000]);
    assert_eq!(series.runtimes, vec![900, 300, 600]);
    assert_eq!(series.stage_gaps, vec![30, 6, 12]);
    assert_eq!(series.fastest(), Some(1));
    assert_eq!(series.slowest(), Some(2));
    assert_eq!(series.histogram_dataset(), &[300, 600]);
}

#[test]
fn test_window_start_rescans_same_run() {
    let mut events = run(0, 900, [Some(10), Some(10), Some(10)]);
    events.extend(run(10_000, 300, [Some(1), Some(2), Some(3)]));
    let config = AnalysisConfig::default();

    let series = measure_runs(&events, &config).unwrap();
    let start = series.window_start(1).unwrap();
    let timeline = scan_window(&events, start, &config).unwrap();

    assert_eq!(timeline.stage_gap_sum(), series.stage_gaps[1]);
}

#[test]
fn test_histogram_dataset_excludes_first_run() {
    assert_eq!(series_with(&[5, 1, 9, 3]).histogram_dataset(), &[1, 9, 3]);
    assert!(series_with(&[5]).histogram_dataset().is_empty());
}

#[test]
fn test_fastest_and_slowest_ties() {
    let series = series_with(&[10, 2, 2, 7]);
    assert_eq!(series.fastest(), Some(1));
    assert_eq!(series.slowest(), Some(3));

    let series = series_with(&[1, 8, 8]);
    assert_eq!(series.slowest(), Some(1));
    assert_eq!(series_with(&[4]).slowest(), None);
}

#[test]
fn test_correlation_of_series() {
    let mut events = Vec::new();
    for (i, gap) in [10i64, 20, 30, 40].into_iter().enumerate() {
        events.extend(run(i as i64 * 10_000, 200 + gap * 10, [Some(gap); 3]));
    }

    let series = measure_runs(&events, &AnalysisConfig::default()).unwrap();
    let correlation = series.correlation().unwrap();
    assert!((correlation.coefficient - 1.0).abs() < 1e-12);
}

#[test]
fn test_nested_start_is_ignored() {
    let events = vec![
        Event::new(RUN_START, 0),
        Event::new(RUN_START, 5),
        Event::new(RUN_STOP, 10),
    ];
    let windows = find_run_windows(&events, &AnalysisConfig::default().events);
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].runtime().unwrap(), 10);
}

#[test]
fn test_missing_field_is_fatal() {
    let events = vec![
        Event::new(RUN_START, 0),
        Event::new(CHUNK_START, 1).with_field("start_ofs", FieldValue::Unsigned(0)),
        Event::new(RUN_STOP, 10),
    ];
    assert!(matches!(
        measure_runs(&events, &AnalysisConfig::default()),
        Err(ScanError::MissingField { .. })
    ));
}

#[test]
fn test_non_positive_runtime_is_fatal() {
    let events = vec![Event::new(RUN_START, 7), Event::new(RUN_STOP, 7)];
    assert!(matches!(
        measure_runs(&events, &AnalysisConfig::default()),
        Err(ScanError::NonPositiveRuntime { .. })
    ));
}
