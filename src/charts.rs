//! Chart rasterization for report sections.
//!
//! Charts are a best-effort visual: rendering races a millisecond budget on a
//! worker thread, and budget expiry or any backend failure degrades to an
//! absent image instead of failing the report.  The [`ChartRenderer`] trait
//! is the injected capability; [`NullChartRenderer`] is the null object used
//! when a deployment has no rasterization support.

use std::f64::consts::{FRAC_PI_2, TAU};
use std::io::Cursor;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;

/// Default soft time budget for one chart render.
pub const DEFAULT_CHART_BUDGET: Duration = Duration::from_millis(2_000);

const PIE_PALETTE: [RGBColor; 6] = [
    RGBColor(0x42, 0x85, 0xf4),
    RGBColor(0xdb, 0x44, 0x37),
    RGBColor(0xf4, 0xb4, 0x00),
    RGBColor(0x0f, 0x9d, 0x58),
    RGBColor(0xab, 0x47, 0xbc),
    RGBColor(0x60, 0x7d, 0x8b),
];
const TREND_COLOR: RGBColor = RGBColor(0x1e, 0x6f, 0xb8);

/// Shape of chart to rasterize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Pie,
    Bar,
    Line,
}

/// One labelled value in a chart series.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Everything needed to rasterize one chart.
#[derive(Clone, Debug)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub series: Vec<SeriesPoint>,
    pub width: u32,
    pub height: u32,
}

impl ChartSpec {
    pub fn pie(series: Vec<SeriesPoint>) -> Self {
        Self {
            kind: ChartKind::Pie,
            series,
            width: 420,
            height: 420,
        }
    }

    pub fn bar(series: Vec<SeriesPoint>) -> Self {
        Self {
            kind: ChartKind::Bar,
            series,
            width: 640,
            height: 360,
        }
    }

    pub fn line(series: Vec<SeriesPoint>) -> Self {
        Self {
            kind: ChartKind::Line,
            series,
            width: 640,
            height: 320,
        }
    }
}

/// A rasterized chart, or the degraded "no image" state.
///
/// `bytes: None` is a valid result, never an error; downstream writers omit
/// the visual and keep everything else.
#[derive(Clone, Debug)]
pub struct ChartImage {
    pub kind: ChartKind,
    pub bytes: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

/// Rasterization capability injected into the report engine.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, spec: ChartSpec) -> ChartImage;
}

/// Null object for deployments without chart support: always "no image".
#[derive(Clone, Copy, Debug, Default)]
pub struct NullChartRenderer;

impl ChartRenderer for NullChartRenderer {
    fn render(&self, spec: ChartSpec) -> ChartImage {
        ChartImage {
            kind: spec.kind,
            bytes: None,
            width: spec.width,
            height: spec.height,
        }
    }
}

/// Chart renderer backed by an in-memory bitmap backend, PNG-encoded.
#[derive(Clone, Debug)]
pub struct RasterChartRenderer {
    budget: Duration,
}

impl RasterChartRenderer {
    pub fn new() -> Self {
        Self {
            budget: DEFAULT_CHART_BUDGET,
        }
    }

    /// Overrides the soft time budget for each render.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }
}

impl Default for RasterChartRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartRenderer for RasterChartRenderer {
    fn render(&self, spec: ChartSpec) -> ChartImage {
        let kind = spec.kind;
        let (width, height) = (spec.width, spec.height);
        let bytes = render_within(self.budget, move || match rasterize(&spec) {
            Ok(png) => Some(png),
            Err(err) => {
                debug!("chart rasterization failed: {err}");
                None
            }
        });
        if bytes.is_none() {
            warn!(
                "{kind:?} chart degraded to no image (budget {:?})",
                self.budget
            );
        }
        ChartImage {
            kind,
            bytes,
            width,
            height,
        }
    }
}

/// Races `job` against `budget` on a worker thread.
///
/// Returns the job's result, or `None` once the budget expires or the worker
/// cannot be spawned.  An expired job keeps running detached; its late result
/// is discarded.
pub fn render_within<T, F>(budget: Duration, job: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> Option<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("chart-render".to_string())
        .spawn(move || {
            let _ = tx.send(job());
        });
    if spawned.is_err() {
        return None;
    }
    rx.recv_timeout(budget).ok().flatten()
}

/// Maps a count to a color by linear interpolation between a cool and a hot
/// hue, proportional to its fraction of the series maximum.
pub fn heat_color(value: f64, max: f64) -> RGBColor {
    let fraction = if max > 0.0 {
        (value / max).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let lerp = |cool: u8, hot: u8| {
        (f64::from(cool) + (f64::from(hot) - f64::from(cool)) * fraction).round() as u8
    };
    RGBColor(lerp(0x2e, 0xc6), lerp(0x7d, 0x28), lerp(0x32, 0x28))
}

fn rasterize(spec: &ChartSpec) -> Result<Vec<u8>, String> {
    let width = spec.width.max(16);
    let height = spec.height.max(16);
    let mut raster = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut raster, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| e.to_string())?;
        match spec.kind {
            ChartKind::Pie => draw_pie(&root, &spec.series).map_err(|e| e.to_string())?,
            ChartKind::Bar => draw_bars(&root, &spec.series).map_err(|e| e.to_string())?,
            ChartKind::Line => draw_line(&root, &spec.series).map_err(|e| e.to_string())?,
        }
        root.present().map_err(|e| e.to_string())?;
    }
    encode_png(width, height, raster)
}

fn draw_pie<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    series: &[SeriesPoint],
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (width, height) = root.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let radius = f64::from(width.min(height)) / 2.0 - 8.0;
    let total: f64 = series.iter().map(|p| p.value.max(0.0)).sum();
    if total <= 0.0 || radius <= 0.0 {
        return Ok(());
    }

    let mut angle = -FRAC_PI_2;
    for (index, point) in series.iter().enumerate() {
        let sweep = point.value.max(0.0) / total * TAU;
        if sweep <= 0.0 {
            continue;
        }
        let steps = ((sweep * 24.0).ceil() as usize).max(2);
        let mut outline = Vec::with_capacity(steps + 2);
        outline.push(center);
        for step in 0..=steps {
            let a = angle + sweep * step as f64 / steps as f64;
            outline.push((
                center.0 + (radius * a.cos()).round() as i32,
                center.1 + (radius * a.sin()).round() as i32,
            ));
        }
        let color = PIE_PALETTE[index % PIE_PALETTE.len()];
        root.draw(&Polygon::new(outline, color.filled()))?;
        angle += sweep;
    }
    Ok(())
}

fn draw_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    series: &[SeriesPoint],
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (width, height) = root.dim_in_pixel();
    let max = series.iter().fold(0.0f64, |m, p| m.max(p.value));
    if series.is_empty() || max <= 0.0 {
        return Ok(());
    }

    let pad = 14;
    let base = height as i32 - pad;
    let plot_height = f64::from(height as i32 - 2 * pad);
    let slot = (width as i32 - 2 * pad) / series.len() as i32;
    let gap = (slot / 6).max(1);

    for (index, point) in series.iter().enumerate() {
        let left = pad + slot * index as i32 + gap;
        let right = pad + slot * (index as i32 + 1) - gap;
        let bar_height = (point.value.max(0.0) / max * plot_height).round() as i32;
        let color = heat_color(point.value, max);
        root.draw(&Rectangle::new(
            [(left, base - bar_height), (right, base)],
            color.filled(),
        ))?;
    }
    root.draw(&PathElement::new(
        vec![(pad, base), (width as i32 - pad, base)],
        BLACK.stroke_width(1),
    ))?;
    Ok(())
}

fn draw_line<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    series: &[SeriesPoint],
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (width, height) = root.dim_in_pixel();
    let max = series.iter().fold(0.0f64, |m, p| m.max(p.value));
    if series.len() < 2 || max <= 0.0 {
        return Ok(());
    }

    let pad = 14;
    let base = height as i32 - pad;
    let plot_height = f64::from(height as i32 - 2 * pad);
    let plot_width = f64::from(width as i32 - 2 * pad);
    let last = (series.len() - 1) as f64;

    let points: Vec<(i32, i32)> = series
        .iter()
        .enumerate()
        .map(|(index, point)| {
            let x = pad + (plot_width * index as f64 / last).round() as i32;
            let y = base - (point.value.max(0.0) / max * plot_height).round() as i32;
            (x, y)
        })
        .collect();

    root.draw(&PathElement::new(
        vec![(pad, base), (width as i32 - pad, base)],
        BLACK.stroke_width(1),
    ))?;
    root.draw(&PathElement::new(points.clone(), TREND_COLOR.stroke_width(2)))?;
    for point in points {
        root.draw(&Circle::new(point, 3, TREND_COLOR.filled()))?;
    }
    Ok(())
}

fn encode_png(width: u32, height: u32, raster: Vec<u8>) -> Result<Vec<u8>, String> {
    let image = image::RgbImage::from_raw(width, height, raster)
        .ok_or_else(|| "raster buffer size mismatch".to_string())?;
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(png)
}
