//! PNG charts drawn with plotters. Every chart falls back to a placeholder
//! image when it has nothing to show.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use plotters::coord::ranged1d::SegmentValue;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::{debug, warn};

use crate::aggregate::GroupMean;
use crate::config::ChartSettings;
use crate::error::RenderError;
use crate::reshape::{DenseTable, SparseTable};
use crate::summary::{ScatterPoint, TrendLine};

const FONT: &str = "sans-serif";
const NO_DATA: &str = "No data available";

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Rendered(PathBuf),
    /// The input was empty; a "no data" image was written instead.
    Placeholder(PathBuf),
}

impl RenderOutcome {
    pub fn path(&self) -> &Path {
        match self {
            RenderOutcome::Rendered(path) | RenderOutcome::Placeholder(path) => path,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, RenderOutcome::Placeholder(_))
    }
}

/// Parses `#rrggbb`.
pub fn parse_hex_color(value: &str) -> Result<RGBColor, RenderError> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RenderError::Color(value.to_string()));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| RenderError::Color(value.to_string()))
    };
    Ok(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

fn palette(settings: &ChartSettings) -> Result<Vec<RGBColor>, RenderError> {
    settings.colors.iter().map(|c| parse_hex_color(c)).collect()
}

fn color_at(colors: &[RGBColor], idx: usize) -> RGBColor {
    colors.get(idx % colors.len().max(1)).copied().unwrap_or(BLUE)
}

fn ensure_parent(path: &Path) -> Result<(), RenderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Title, axis captions and a centred "No data available". The image is
/// written even when no font can be loaded for the text.
pub fn placeholder(
    settings: &ChartSettings,
    x_desc: &str,
    y_desc: &str,
) -> Result<RenderOutcome, RenderError> {
    ensure_parent(&settings.path)?;
    let root =
        BitMapBackend::new(&settings.path, (settings.width, settings.height)).into_drawing_area();
    root.fill(&WHITE)?;
    if let Err(err) = placeholder_text(&root, settings.kind.title(), x_desc, y_desc) {
        warn!(path = %settings.path.display(), error = %err, "placeholder written without text");
    }
    root.present()?;
    Ok(RenderOutcome::Placeholder(settings.path.clone()))
}

fn placeholder_text(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    title: &str,
    x_desc: &str,
    y_desc: &str,
) -> Result<(), RenderError> {
    let area = root.titled(title, (FONT, 32).into_font())?;
    let (w, h) = area.dim_in_pixel();

    let center = TextStyle::from((FONT, 24).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    area.draw(&Text::new(NO_DATA, (w as i32 / 2, h as i32 / 2), center))?;

    let caption = TextStyle::from((FONT, 16).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom));
    area.draw(&Text::new(
        format!("{x_desc} / {y_desc}"),
        (w as i32 / 2, h as i32 - 10),
        caption,
    ))?;
    Ok(())
}

// =============================================================================
// Bar chart
// =============================================================================

/// One bar per continent with its value on top. Groups without a value get
/// no bar and an "n/a" label.
pub fn bar_chart(
    means: &[GroupMean],
    settings: &ChartSettings,
) -> Result<RenderOutcome, RenderError> {
    const X_DESC: &str = "Continent";
    const Y_DESC: &str = "Deaths per Million";

    if means.is_empty() {
        return placeholder(settings, X_DESC, Y_DESC);
    }
    let colors = palette(settings)?;
    let bar_color = color_at(&colors, 0);

    ensure_parent(&settings.path)?;
    let root =
        BitMapBackend::new(&settings.path, (settings.width, settings.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let max = means
        .iter()
        .filter_map(|m| m.mean)
        .fold(0.0_f64, f64::max);
    let y_top = if max > 0.0 { max * 1.1 } else { 1.0 };
    let names: Vec<&str> = means.iter().map(|m| m.continent.as_str()).collect();

    let mut chart = ChartBuilder::on(&root)
        .caption(settings.kind.title(), (FONT, 32))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d((0u32..names.len() as u32).into_segmented(), 0f64..y_top)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(X_DESC)
        .y_desc(Y_DESC)
        .x_labels(names.len())
        .x_label_formatter(&|v: &SegmentValue<u32>| match v {
            SegmentValue::CenterOf(i) => names.get(*i as usize).copied().unwrap_or("").to_string(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(means.iter().enumerate().filter_map(|(i, m)| {
        let i = i as u32;
        m.mean.map(|v| {
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), v)],
                bar_color.filled(),
            );
            bar.set_margin(0, 0, 8, 8);
            bar
        })
    }))?;

    let label_style =
        TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom));
    chart.draw_series(means.iter().enumerate().map(|(i, m)| {
        let (text, y) = match m.mean {
            Some(v) => (format!("{v:.1}"), v),
            None => ("n/a".to_string(), 0.0),
        };
        Text::new(text, (SegmentValue::CenterOf(i as u32), y), label_style.clone())
    }))?;

    root.present()?;
    debug!(path = %settings.path.display(), bars = means.len(), "bar chart written");
    Ok(RenderOutcome::Rendered(settings.path.clone()))
}

// =============================================================================
// Line chart
// =============================================================================

/// Splits a series into runs of consecutive present values so missing cells
/// become gaps instead of zeros.
pub fn present_runs(series: &[(NaiveDate, Option<f64>)]) -> Vec<Vec<(NaiveDate, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (date, value) in series {
        match value {
            Some(v) => current.push((*date, *v)),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn date_span(first: NaiveDate, last: NaiveDate) -> std::ops::Range<NaiveDate> {
    if first < last {
        first..last
    } else {
        first..last.succ_opt().unwrap_or(last)
    }
}

/// One line per column of `table`.
pub fn line_chart(
    table: &SparseTable,
    settings: &ChartSettings,
) -> Result<RenderOutcome, RenderError> {
    const X_DESC: &str = "Date";
    const Y_DESC: &str = "Smoothed New Cases";

    let series: Vec<(String, Vec<Vec<(NaiveDate, f64)>>)> = table
        .columns()
        .iter()
        .map(|name| {
            let points = table.series(name).unwrap_or_default();
            (name.clone(), present_runs(&points))
        })
        .collect();

    let values = || series.iter().flat_map(|(_, runs)| runs.iter().flatten());
    let (Some(first), Some(last)) = (
        values().map(|(d, _)| *d).min(),
        values().map(|(d, _)| *d).max(),
    ) else {
        return placeholder(settings, X_DESC, Y_DESC);
    };
    let max = values().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let min = values().map(|(_, v)| *v).fold(0.0_f64, f64::min);
    let y_top = if max > 0.0 { max * 1.05 } else { 1.0 };

    let colors = palette(settings)?;
    ensure_parent(&settings.path)?;
    let root =
        BitMapBackend::new(&settings.path, (settings.width, settings.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(settings.kind.title(), (FONT, 32))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(date_span(first, last), min..y_top)?;

    chart
        .configure_mesh()
        .light_line_style(BLACK.mix(0.05))
        .x_desc(X_DESC)
        .y_desc(Y_DESC)
        .x_labels(10)
        .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m").to_string())
        .draw()?;

    for (idx, (name, runs)) in series.iter().enumerate() {
        let color = color_at(&colors, idx);
        let mut labelled = false;
        for run in runs {
            let drawn = if run.len() == 1 {
                chart.draw_series(run.iter().map(|p| Circle::new(*p, 2, color.filled())))?
            } else {
                chart.draw_series(LineSeries::new(run.iter().copied(), color.stroke_width(2)))?
            };
            if !labelled {
                drawn.label(name.as_str()).legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
                labelled = true;
            }
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    debug!(path = %settings.path.display(), "line chart written");
    Ok(RenderOutcome::Rendered(settings.path.clone()))
}

// =============================================================================
// Scatter chart
// =============================================================================

pub fn scatter_chart(
    points: &[ScatterPoint],
    trend: Option<TrendLine>,
    settings: &ChartSettings,
) -> Result<RenderOutcome, RenderError> {
    const X_DESC: &str = "People Fully Vaccinated per Hundred";
    const Y_DESC: &str = "Total Deaths per Million";

    if points.is_empty() {
        return placeholder(settings, X_DESC, Y_DESC);
    }
    let colors = palette(settings)?;
    let dot_color = color_at(&colors, 0);

    let x_max = points.iter().map(|p| p.x).fold(0.0_f64, f64::max);
    let y_max = points.iter().map(|p| p.y).fold(0.0_f64, f64::max);
    let x_min = points.iter().map(|p| p.x).fold(0.0_f64, f64::min);
    let y_min = points.iter().map(|p| p.y).fold(0.0_f64, f64::min);
    let x_top = if x_max > 0.0 { x_max * 1.05 } else { 1.0 };
    let y_top = if y_max > 0.0 { y_max * 1.05 } else { 1.0 };

    ensure_parent(&settings.path)?;
    let root =
        BitMapBackend::new(&settings.path, (settings.width, settings.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(settings.kind.title(), (FONT, 32))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_top, y_min..y_top)?;

    chart
        .configure_mesh()
        .light_line_style(BLACK.mix(0.05))
        .x_desc(X_DESC)
        .y_desc(Y_DESC)
        .draw()?;

    chart.draw_series(
        points
            .iter()
            .map(|p| Circle::new((p.x, p.y), 5, dot_color.mix(0.6).filled())),
    )?;

    if let Some(line) = trend {
        let lo = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let hi = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        chart.draw_series(LineSeries::new(
            [(lo, line.at(lo)), (hi, line.at(hi))],
            BLACK.mix(0.8).stroke_width(2),
        ))?;
    }

    root.present()?;
    debug!(path = %settings.path.display(), points = points.len(), "scatter chart written");
    Ok(RenderOutcome::Rendered(settings.path.clone()))
}

// =============================================================================
// Stacked area chart
// =============================================================================

/// Cumulative (lower, upper) bands per column, bottom column first.
pub fn stack_bands(table: &DenseTable) -> Vec<Vec<(NaiveDate, f64, f64)>> {
    let width = table.columns().len();
    let mut bands = vec![Vec::with_capacity(table.len()); width];
    for (date, values) in table.rows() {
        let mut base = 0.0;
        for (band, value) in bands.iter_mut().zip(values) {
            band.push((date, base, base + value));
            base += value;
        }
    }
    bands
}

pub fn stacked_area_chart(
    table: &DenseTable,
    settings: &ChartSettings,
) -> Result<RenderOutcome, RenderError> {
    const X_DESC: &str = "Date";
    const Y_DESC: &str = "Smoothed New Cases";

    let (Some(first), Some(last)) = (table.dates().next(), table.dates().last()) else {
        return placeholder(settings, X_DESC, Y_DESC);
    };
    let colors = palette(settings)?;
    let top = table.max_row_total();
    let y_top = if top > 0.0 { top * 1.05 } else { 1.0 };

    ensure_parent(&settings.path)?;
    let root =
        BitMapBackend::new(&settings.path, (settings.width, settings.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(settings.kind.title(), (FONT, 32))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(100)
        .build_cartesian_2d(date_span(first, last), 0f64..y_top)?;

    chart
        .configure_mesh()
        .light_line_style(BLACK.mix(0.05))
        .x_desc(X_DESC)
        .y_desc(Y_DESC)
        .x_labels(12)
        .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m").to_string())
        .draw()?;

    for (idx, (name, band)) in table.columns().iter().zip(stack_bands(table)).enumerate() {
        let color = color_at(&colors, idx);
        let outline: Vec<(NaiveDate, f64)> = band
            .iter()
            .map(|(d, _, upper)| (*d, *upper))
            .chain(band.iter().rev().map(|(d, lower, _)| (*d, *lower)))
            .collect();
        chart
            .draw_series(std::iter::once(Polygon::new(outline, color.mix(0.8).filled())))?
            .label(name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    debug!(path = %settings.path.display(), months = table.len(), "stacked area chart written");
    Ok(RenderOutcome::Rendered(settings.path.clone()))
}
