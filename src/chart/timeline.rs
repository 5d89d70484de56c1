//! Broken-bar timeline of a single run.
//!
//! Each chunk gets one row at the height of its offset range, with a red
//! bar for its stage 1 interval and an orange bar for its stage 3 interval.
//! The vertical axis is inverted so offset 0 is at the top.

use super::svg::{
    begin_document, end_document, format_tick, nice_ticks, render_axes, render_legend, Axis,
    LegendMark, PlotArea,
};
use super::ChartConfig;
use crate::aggregator::window::{ChunkKey, ChunkTimeline, Interval};
use crate::utils::config::{BASELINE_COLOR, FIRST_STAGE, STAGE1_COLOR, STAGE3_COLOR, THIRD_STAGE};
use crate::utils::error::ChartError;
use log::{debug, info};

/// Most labelled ticks on the chunk axis before labels are thinned out
const MAX_Y_LABELS: u64 = 40;

/// One row of the chart
struct ChunkBars {
    key: ChunkKey,
    stage1: Interval,
    stage3: Interval,
}

/// Render the timeline of one run as SVG
///
/// **Public** - main entry point for run charts
///
/// # Arguments
/// * `timeline` - Indexed chunk events of the run
/// * `config` - Title, size and optional sequential baseline
///
/// # Errors
/// * `ChartError::MissingChunkSize` / `MissingInputSize` / `ZeroChunkSize` -
///   The axis extent cannot be derived
/// * `ChartError::MissingStageInterval` - A finished stage 1 chunk has no
///   complete stage 3 interval
pub fn generate_timeline(timeline: &ChunkTimeline, config: &ChartConfig) -> Result<String, ChartError> {
    let chunk_size = timeline.chunk_size.ok_or(ChartError::MissingChunkSize)?;
    let input_size = timeline.input_size.ok_or(ChartError::MissingInputSize)?;
    if chunk_size == 0 {
        return Err(ChartError::ZeroChunkSize);
    }

    let rows = collect_rows(timeline)?;
    info!("Generating timeline '{}' with {} chunks", config.title, rows.len());

    let latest = rows
        .iter()
        .map(|row| row.stage1.stop.max(row.stage3.stop))
        .max()
        .unwrap_or(0)
        .max(0) as f64;
    let x_max = latest.max(config.seq_runtime.unwrap_or(0) as f64);

    let area = PlotArea::new(
        config.width,
        config.height,
        (0.0, x_max),
        (0.0, input_size as f64),
    )
    .inverted();

    let mut out = String::new();
    begin_document(&mut out, config.width, config.height, &config.title);

    let x_ticks: Vec<(f64, String)> = nice_ticks(0.0, x_max, 8)
        .into_iter()
        .map(|v| (v, format_tick(v)))
        .collect();
    let y_ticks = chunk_ticks(chunk_size, input_size);
    render_axes(
        &mut out,
        &area,
        &Axis {
            ticks: &x_ticks,
            label: "time (ns)",
            grid: true,
        },
        &Axis {
            ticks: &y_ticks,
            label: "chunk extent",
            grid: true,
        },
    );

    for row in &rows {
        render_bar(&mut out, &area, &row.key, &row.stage1, FIRST_STAGE, STAGE1_COLOR);
        render_bar(&mut out, &area, &row.key, &row.stage3, THIRD_STAGE, STAGE3_COLOR);
    }

    let mut legend = vec![
        ("Stage 1", LegendMark::Patch(STAGE1_COLOR)),
        ("Stage 3", LegendMark::Patch(STAGE3_COLOR)),
    ];

    if let Some(seq) = config.seq_runtime {
        let x = area.map_x(seq as f64);
        out.push_str(&format!(
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="1.5" stroke-dasharray="6,4"/>"#,
            x,
            area.top,
            x,
            area.bottom(),
            BASELINE_COLOR
        ));
        legend.push(("Seq Runtime", LegendMark::DashedLine(BASELINE_COLOR)));
    }

    render_legend(&mut out, &area, &legend);
    end_document(&mut out);

    debug!("Timeline rendered ({} bytes)", out.len());
    Ok(out)
}

/// Pair every finished stage 1 chunk with its stage 3 interval
fn collect_rows(timeline: &ChunkTimeline) -> Result<Vec<ChunkBars>, ChartError> {
    timeline
        .stage1
        .stops
        .keys()
        .map(|key| {
            let missing = |stage| ChartError::MissingStageInterval {
                start_ofs: key.start_ofs,
                stop_ofs: key.stop_ofs,
                stage,
            };
            Ok(ChunkBars {
                key: *key,
                stage1: timeline.stage1.interval(key).ok_or_else(|| missing(FIRST_STAGE))?,
                stage3: timeline.stage3.interval(key).ok_or_else(|| missing(THIRD_STAGE))?,
            })
        })
        .collect()
}

/// Ticks at every multiple of the chunk size up to the input size
fn chunk_ticks(chunk_size: u64, input_size: u64) -> Vec<(f64, String)> {
    let count = input_size / chunk_size + 1;
    let stride = count.div_ceil(MAX_Y_LABELS).max(1);
    (0..count)
        .step_by(stride as usize)
        .map(|i| {
            let v = i * chunk_size;
            (v as f64, v.to_string())
        })
        .collect()
}

fn render_bar(
    out: &mut String,
    area: &PlotArea,
    key: &ChunkKey,
    interval: &Interval,
    stage: i64,
    color: &str,
) {
    let x = area.map_x(interval.start as f64);
    let w = (area.map_x(interval.stop as f64) - x).max(0.5);
    let y = area.map_y(key.start_ofs as f64);
    let h = (area.map_y(key.stop_ofs as f64) - y).max(0.5);

    out.push_str(&format!(
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" class="bar"><title>[{}, {}) stage {}: {} - {} ns ({} ns)</title></rect>"#,
        x,
        y,
        w,
        h,
        color,
        key.start_ofs,
        key.stop_ofs,
        stage,
        interval.start,
        interval.stop,
        interval.duration()
    ));
}
