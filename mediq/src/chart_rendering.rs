//! Raster charts for the insights command.
//!
//! Charts are plain RGBA buffers with axes, bars or markers and a color-swatch
//! legend. No text is drawn.

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::fs;
use std::path::Path;

use crate::insights::{Histogram, ScatterPoint};

pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const AXIS: Rgba<u8> = Rgba([40, 40, 40, 255]);
pub const BAR: Rgba<u8> = Rgba([70, 130, 180, 255]);

#[derive(Debug, Clone, Copy)]
pub struct ChartStyle {
    pub size: (u32, u32),
    pub margin: u32,
    pub background: Rgba<u8>,
    pub axis: Rgba<u8>,
    pub bar: Rgba<u8>,
    pub marker_radius: i32,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            size: (800, 600),
            margin: 40,
            background: BACKGROUND,
            axis: AXIS,
            bar: BAR,
            marker_radius: 3,
        }
    }
}

impl ChartStyle {
    pub fn with_size(size: (u32, u32)) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }
}

/// Fixed marker color per patient gender
pub fn group_color(group: &str) -> Rgba<u8> {
    match group.trim().to_ascii_uppercase().as_str() {
        "M" => Rgba([31, 119, 180, 255]),
        "F" => Rgba([227, 119, 194, 255]),
        _ => Rgba([127, 127, 127, 255]),
    }
}

/// Pixel bounds of the plotting area inside the margins
#[derive(Debug, Clone, Copy, PartialEq)]
struct PlotArea {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl PlotArea {
    fn new(style: &ChartStyle) -> Self {
        let (w, h) = style.size;
        let m = style.margin.min(w / 3).min(h / 3) as f32;
        Self {
            left: m,
            top: m / 2.0,
            right: w as f32 - m / 2.0,
            bottom: h as f32 - m,
        }
    }

    fn width(&self) -> f32 {
        self.right - self.left
    }

    fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

fn blank_canvas(style: &ChartStyle) -> RgbaImage {
    let (w, h) = style.size;
    RgbaImage::from_pixel(w.max(1), h.max(1), style.background)
}

fn draw_axes(img: &mut RgbaImage, area: &PlotArea, color: Rgba<u8>) {
    draw_line_segment_mut(img, (area.left, area.bottom), (area.right, area.bottom), color);
    draw_line_segment_mut(img, (area.left, area.top), (area.left, area.bottom), color);
}

fn draw_legend(img: &mut RgbaImage, area: &PlotArea, colors: &[Rgba<u8>]) {
    const SWATCH: u32 = 10;
    let y = ((area.top - SWATCH as f32) / 2.0).max(0.0) as i32;
    for (k, color) in colors.iter().enumerate() {
        let x = area.right as i32 - ((k as i32 + 1) * (SWATCH as i32 + 4));
        if x < area.left as i32 {
            break;
        }
        draw_filled_rect_mut(img, Rect::at(x, y).of_size(SWATCH, SWATCH), *color);
    }
}

/// Bar chart of a histogram; bar heights are relative to the tallest bin
pub fn render_histogram(histogram: &Histogram, style: &ChartStyle) -> RgbaImage {
    let mut img = blank_canvas(style);
    let area = PlotArea::new(style);
    let max_count = histogram.counts.iter().copied().max().unwrap_or(0);

    if max_count > 0 {
        let bin_px = area.width() / histogram.counts.len() as f32;
        for (i, &count) in histogram.counts.iter().enumerate() {
            let bar_height = (count as f32 / max_count as f32 * area.height()).round() as u32;
            if bar_height == 0 {
                continue;
            }
            let x0 = (area.left + i as f32 * bin_px).round() as i32 + 1;
            let x1 = (area.left + (i + 1) as f32 * bin_px).round() as i32;
            let bar_width = (x1 - x0).max(1) as u32;
            let y0 = area.bottom as i32 - bar_height as i32;
            draw_filled_rect_mut(
                &mut img,
                Rect::at(x0, y0).of_size(bar_width, bar_height),
                style.bar,
            );
        }
    }

    draw_axes(&mut img, &area, style.axis);
    img
}

/// Axis range padded by 5% so markers stay off the axes
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let span = max - min;
    let pad = if span > 0.0 { span * 0.05 } else { 1.0 };
    (min - pad, max + pad)
}

/// Scatter plot with one marker per point, colored by group
pub fn render_scatter(points: &[ScatterPoint], style: &ChartStyle) -> RgbaImage {
    let mut img = blank_canvas(style);
    let area = PlotArea::new(style);
    draw_axes(&mut img, &area, style.axis);

    let points: Vec<&ScatterPoint> = points
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .collect();
    if points.is_empty() {
        return img;
    }

    let (x_min, x_max) = padded_range(points.iter().map(|p| p.x));
    let (y_min, y_max) = padded_range(points.iter().map(|p| p.y));

    let mut legend: Vec<Rgba<u8>> = Vec::new();
    for point in points {
        let color = group_color(&point.group);
        if !legend.contains(&color) {
            legend.push(color);
        }
        let px = area.left as f64 + (point.x - x_min) / (x_max - x_min) * area.width() as f64;
        let py = area.bottom as f64 - (point.y - y_min) / (y_max - y_min) * area.height() as f64;
        draw_filled_circle_mut(
            &mut img,
            (px.round() as i32, py.round() as i32),
            style.marker_radius,
            color,
        );
    }

    draw_legend(&mut img, &area, &legend);
    img
}

/// Write a chart as PNG, creating the parent directory
pub fn save_chart(chart: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    chart
        .save(path)
        .with_context(|| format!("Failed to write chart {}", path.display()))
}
