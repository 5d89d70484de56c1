//! Terminal table of per-run measurements.

use crate::aggregator::RunSeries;

/// Format every run as a table, marking the fastest and slowest runs
pub fn format_run_table(series: &RunSeries) -> String {
    let fastest = series.fastest();
    let slowest = series.slowest();

    let mut lines = Vec::with_capacity(series.len() + 5);
    lines.push("  ┏━━━━━━━┳━━━━━━━━━━━━━━━━━━━━━━┳━━━━━━━━━━━━━━┳━━━━━━━━━━━━━━┳━━━━━━━━━┓".to_string());
    lines.push(format!(
        "  ┃ {:>5} ┃ {:>20} ┃ {:>12} ┃ {:>12} ┃ {:^7} ┃",
        "RUN", "START (ns)", "RUNTIME", "STAGE GAP", ""
    ));
    lines.push("  ┣━━━━━━━╋━━━━━━━━━━━━━━━━━━━━━━╋━━━━━━━━━━━━━━╋━━━━━━━━━━━━━━╋━━━━━━━━━┫".to_string());

    for sample in series.samples() {
        let mark = if Some(sample.index) == fastest {
            "fastest"
        } else if Some(sample.index) == slowest {
            "slowest"
        } else if sample.index == 0 {
            "warmup"
        } else {
            ""
        };
        lines.push(format!(
            "  ┃ {:>5} ┃ {:>20} ┃ {:>12} ┃ {:>12} ┃ {:^7} ┃",
            sample.index, sample.start_time, sample.runtime, sample.stage_gap, mark
        ));
    }

    lines.push("  ┗━━━━━━━┻━━━━━━━━━━━━━━━━━━━━━━┻━━━━━━━━━━━━━━┻━━━━━━━━━━━━━━┻━━━━━━━━━┛".to_string());

    if let Some(dataset) = mean_and_spread(series.histogram_dataset()) {
        lines.push(format!(
            "   mean runtime {:.0} ns, std dev {:.0} ns (excluding run 0)",
            dataset.0, dataset.1
        ));
    }

    lines.join("\n")
}

/// Mean and population standard deviation
fn mean_and_spread(values: &[i64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}
