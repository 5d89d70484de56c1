//! Runtime distribution histogram.

use super::svg::{begin_document, end_document, format_tick, nice_ticks, render_axes, Axis, PlotArea};
use super::ChartConfig;
use crate::utils::config::HISTOGRAM_COLOR;
use crate::utils::error::ChartError;
use log::info;

/// Equal-width bins between the minimum and maximum of a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `data` into `bins` intervals; every bin is half-open except the
    /// last, which also holds the maximum
    ///
    /// A constant dataset is spread over `[v - 0.5, v + 0.5]`.
    pub fn compute(data: &[i64], bins: usize) -> Result<Self, ChartError> {
        let (Some(&min), Some(&max)) = (data.iter().min(), data.iter().max()) else {
            return Err(ChartError::EmptyDataset);
        };
        let bins = bins.max(1);

        let (lo, hi) = if min == max {
            (min as f64 - 0.5, max as f64 + 0.5)
        } else {
            (min as f64, max as f64)
        };
        let width = (hi - lo) / bins as f64;

        let mut edges: Vec<f64> = (0..bins).map(|i| lo + i as f64 * width).collect();
        edges.push(hi);

        let mut counts = vec![0usize; bins];
        for &value in data {
            let bin = (((value as f64 - lo) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }

        Ok(Self { edges, counts })
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Render a histogram of `data` as SVG
///
/// **Public** - main entry point for the runtime distribution chart
///
/// # Errors
/// * `ChartError::EmptyDataset` - Nothing to bin
pub fn generate_histogram(data: &[i64], bins: usize, config: &ChartConfig) -> Result<String, ChartError> {
    let histogram = Histogram::compute(data, bins)?;
    info!(
        "Generating histogram of {} runtimes in {} bins",
        data.len(),
        histogram.bins()
    );

    let lo = histogram.edges[0];
    let hi = histogram.edges[histogram.bins()];
    let top = histogram.max_count().max(1) as f64;

    let area = PlotArea::new(config.width, config.height, (lo, hi), (0.0, top));

    let mut out = String::new();
    begin_document(&mut out, config.width, config.height, &config.title);

    let x_ticks: Vec<(f64, String)> = nice_ticks(lo, hi, 8)
        .into_iter()
        .map(|v| (v, format_tick(v)))
        .collect();
    // Counts are whole numbers
    let y_ticks: Vec<(f64, String)> = nice_ticks(0.0, top, 5)
        .into_iter()
        .filter(|v| v.fract() == 0.0)
        .map(|v| (v, format_tick(v)))
        .collect();
    render_axes(
        &mut out,
        &area,
        &Axis {
            ticks: &x_ticks,
            label: "ns",
            grid: false,
        },
        &Axis {
            ticks: &y_ticks,
            label: "",
            grid: false,
        },
    );

    for (i, &count) in histogram.counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let (left, right) = (histogram.edges[i], histogram.edges[i + 1]);
        let x = area.map_x(left);
        let w = area.map_x(right) - x;
        let y = area.map_y(count as f64);
        let h = area.bottom() - y;
        out.push_str(&format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" class="bar"><title>{:.0} - {:.0} ns: {} runs</title></rect>"#,
            x, y, w, h, HISTOGRAM_COLOR, left, right, count
        ));
    }

    end_document(&mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maximum_lands_in_last_bin() {
        let histogram = Histogram::compute(&[0, 5, 10], 2).unwrap();
        assert_eq!(histogram.edges, vec![0.0, 5.0, 10.0]);
        assert_eq!(histogram.counts, vec![1, 2]);
    }

    #[test]
    fn test_fifty_bins() {
        let data: Vec<i64> = (0..100).collect();
        let histogram = Histogram::compute(&data, 50).unwrap();
        assert_eq!(histogram.bins(), 50);
        assert_eq!(histogram.counts.iter().sum::<usize>(), 100);
        assert_eq!(histogram.edges.len(), 51);
        assert_eq!(histogram.edges[50], 99.0);
    }

    #[test]
    fn test_constant_dataset() {
        let histogram = Histogram::compute(&[7, 7, 7], 4).unwrap();
        assert_eq!(histogram.edges.first(), Some(&6.5));
        assert_eq!(histogram.edges.last(), Some(&7.5));
        assert_eq!(histogram.counts.iter().sum::<usize>(), 3);
        assert_eq!(histogram.max_count(), 3);
    }

    #[test]
    fn test_empty_dataset() {
        assert!(matches!(Histogram::compute(&[], 50), Err(ChartError::EmptyDataset)));
    }

    #[test]
    fn test_generate_histogram_svg() {
        let config = ChartConfig::new().with_title("Runtime Distribution");
        let svg = generate_histogram(&[100, 200, 200, 400], 3, &config).unwrap();
        assert!(svg.contains("Runtime Distribution"));
        assert!(svg.contains(">ns<"));
        assert_eq!(svg.matches(HISTOGRAM_COLOR).count(), 3);
    }
}
