//! Shared SVG building blocks: plot area mapping, axes, ticks and legend.

/// Space around the plot area for title, labels and tick text
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;

const GRID_COLOR: &str = "#b0b0b0";

/// Mapping from data coordinates to pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    /// Origin at the top, values grow downwards
    pub invert_y: bool,
}

impl PlotArea {
    /// Plot area of a chart of the given pixel size
    pub fn new(width: usize, height: usize, x_range: (f64, f64), y_range: (f64, f64)) -> Self {
        Self {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            width: (width as f64 - MARGIN_LEFT - MARGIN_RIGHT).max(1.0),
            height: (height as f64 - MARGIN_TOP - MARGIN_BOTTOM).max(1.0),
            x_range: widen(x_range),
            y_range: widen(y_range),
            invert_y: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert_y = true;
        self
    }

    pub fn map_x(&self, v: f64) -> f64 {
        let (lo, hi) = self.x_range;
        self.left + (v - lo) / (hi - lo) * self.width
    }

    pub fn map_y(&self, v: f64) -> f64 {
        let (lo, hi) = self.y_range;
        let frac = (v - lo) / (hi - lo);
        if self.invert_y {
            self.top + frac * self.height
        } else {
            self.top + self.height - frac * self.height
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

/// Avoid a zero-width range, which would divide by zero when mapping
fn widen((lo, hi): (f64, f64)) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo, lo + 1.0)
    }
}

/// Evenly spaced ticks on a 1/2/5 x 10^k step covering `[min, max]`
pub fn nice_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    if !min.is_finite() || !max.is_finite() || max <= min {
        return vec![min];
    }

    let raw = (max - min) / target.max(1) as f64;
    let magnitude = 10f64.powi(raw.log10().floor() as i32);
    let normalized = raw / magnitude;
    let step = magnitude
        * if normalized <= 1.0 {
            1.0
        } else if normalized <= 2.0 {
            2.0
        } else if normalized <= 5.0 {
            5.0
        } else {
            10.0
        };

    let first = (min / step).ceil() as i64;
    let last = (max / step + 1e-9).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}

/// Tick label without a trailing `.0` for whole numbers
pub fn format_tick(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        let text = format!("{:.3}", v);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// Open an SVG document with a white background and a centered title
pub fn begin_document(out: &mut String, width: usize, height: usize, title: &str) {
    out.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">"#,
        width, height, width, height
    ));
    out.push_str(r#"<style>text { font-family: sans-serif; } .bar:hover { stroke: black; stroke-width: 1; }</style>"#);
    out.push_str(&format!(
        r#"<rect x="0" y="0" width="{}" height="{}" fill="white"/>"#,
        width, height
    ));
    out.push_str(&format!(
        r#"<text x="{}" y="28" font-size="16" text-anchor="middle" font-weight="bold">{}</text>"#,
        width / 2,
        escape_xml(title)
    ));
}

pub fn end_document(out: &mut String) {
    out.push_str("</svg>");
}

/// One labelled axis: tick positions in data coordinates and their labels
pub struct Axis<'a> {
    pub ticks: &'a [(f64, String)],
    pub label: &'a str,
    pub grid: bool,
}

/// Draw the frame, ticks, grid lines and axis labels
pub fn render_axes(out: &mut String, area: &PlotArea, x_axis: &Axis<'_>, y_axis: &Axis<'_>) {
    for (value, label) in x_axis.ticks {
        let x = area.map_x(*value);
        if x_axis.grid {
            out.push_str(&format!(
                r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="0.5"/>"#,
                x, area.top, x, area.bottom(), GRID_COLOR
            ));
        }
        out.push_str(&format!(
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="black"/>"#,
            x,
            area.bottom(),
            x,
            area.bottom() + 5.0
        ));
        out.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" font-size="11" text-anchor="middle">{}</text>"#,
            x,
            area.bottom() + 18.0,
            escape_xml(label)
        ));
    }

    for (value, label) in y_axis.ticks {
        let y = area.map_y(*value);
        if y_axis.grid {
            out.push_str(&format!(
                r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="0.5"/>"#,
                area.left, y, area.right(), y, GRID_COLOR
            ));
        }
        out.push_str(&format!(
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="black"/>"#,
            area.left - 5.0,
            y,
            area.left,
            y
        ));
        out.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" font-size="11" text-anchor="end" dy="4">{}</text>"#,
            area.left - 8.0,
            y,
            escape_xml(label)
        ));
    }

    out.push_str(&format!(
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="black"/>"#,
        area.left, area.top, area.width, area.height
    ));

    if !x_axis.label.is_empty() {
        out.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" font-size="13" text-anchor="middle">{}</text>"#,
            area.left + area.width / 2.0,
            area.bottom() + 42.0,
            escape_xml(x_axis.label)
        ));
    }
    if !y_axis.label.is_empty() {
        let cx = area.left - 70.0;
        let cy = area.top + area.height / 2.0;
        out.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" font-size="13" text-anchor="middle" transform="rotate(-90 {:.2} {:.2})">{}</text>"#,
            cx,
            cy,
            cx,
            cy,
            escape_xml(y_axis.label)
        ));
    }
}

/// How a legend entry is drawn
pub enum LegendMark<'a> {
    Patch(&'a str),
    DashedLine(&'a str),
}

/// Boxed legend in the upper right corner of the plot area
pub fn render_legend(out: &mut String, area: &PlotArea, items: &[(&str, LegendMark<'_>)]) {
    let row_height = 20.0;
    let box_width = 130.0;
    let box_height = items.len() as f64 * row_height + 10.0;
    let x = area.right() - box_width - 10.0;
    let y = area.top + 10.0;

    out.push_str(&format!(
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="white" fill-opacity="0.8" stroke="{}" rx="3"/>"#,
        x, y, box_width, box_height, GRID_COLOR
    ));

    for (i, (label, mark)) in items.iter().enumerate() {
        let row_y = y + 5.0 + i as f64 * row_height;
        match mark {
            LegendMark::Patch(color) => out.push_str(&format!(
                r#"<rect x="{:.2}" y="{:.2}" width="20" height="12" fill="{}"/>"#,
                x + 8.0,
                row_y + 3.0,
                color
            )),
            LegendMark::DashedLine(color) => out.push_str(&format!(
                r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="1.5" stroke-dasharray="6,4"/>"#,
                x + 8.0,
                row_y + 9.0,
                x + 28.0,
                row_y + 9.0,
                color
            )),
        }
        out.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" font-size="12">{}</text>"#,
            x + 36.0,
            row_y + 14.0,
            escape_xml(label)
        ));
    }
}
