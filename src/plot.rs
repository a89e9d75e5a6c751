//! Regression chart rendering
//!
//! Draws, for every channel, the actual readings as a scatter and the fitted
//! values as a line ordered by x, on shared axes with tick values, a title,
//! axis labels and a legend. Text uses the 8x8 bitmap glyphs of `font8x8`.

use crate::error::{AnalyzerError, Result};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};
use std::path::Path;
use tracing::info;

/// Common color definitions
pub mod colors {
    use image::Rgb;

    pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    pub const GRID: Rgb<u8> = Rgb([230, 230, 230]);
    pub const LEGEND_BORDER: Rgb<u8> = Rgb([200, 200, 200]);

    /// Artist color cycle: scatter and line of each channel take consecutive entries
    pub const CYCLE: [Rgb<u8>; 6] = [
        Rgb([31, 119, 180]),
        Rgb([255, 127, 14]),
        Rgb([44, 160, 44]),
        Rgb([214, 39, 40]),
        Rgb([148, 103, 189]),
        Rgb([140, 86, 75]),
    ];
}

/// Chart texts
pub const TITLE: &str = "Regression Analysis";
pub const X_LABEL: &str = "Amperes";
pub const Y_LABEL: &str = "Values";

/// One channel's data for the chart
#[derive(Debug, Clone)]
pub struct RegressionSeries {
    pub channel: String,
    /// Observed `(x, y)` points
    pub actual: Vec<(f64, f64)>,
    /// Fitted `(x, y_pred)` points
    pub fitted: Vec<(f64, f64)>,
}

impl RegressionSeries {
    /// Build a series, ordering the fitted points by x
    pub fn new(channel: &str, x: &[f64], y: &[f64], y_pred: &[f64]) -> Self {
        let actual = x.iter().copied().zip(y.iter().copied()).collect();
        let mut fitted: Vec<(f64, f64)> = x.iter().copied().zip(y_pred.iter().copied()).collect();
        fitted.sort_by(|a, b| a.0.total_cmp(&b.0));

        Self {
            channel: channel.to_string(),
            actual,
            fitted,
        }
    }

    pub fn scatter_label(&self) -> String {
        legend_entries(&self.channel)[0].clone()
    }

    pub fn line_label(&self) -> String {
        legend_entries(&self.channel)[1].clone()
    }
}

/// Legend texts for a channel: scatter first, then the regression line
pub fn legend_entries(channel: &str) -> [String; 2] {
    [
        format!("Actual Data ({})", channel),
        format!("Regression Line ({})", channel),
    ]
}

/// Chart configuration
#[derive(Debug, Clone)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub background: Rgb<u8>,
    pub point_radius: i64,
    pub line_width: i64,
    pub ticks: usize,
    /// Glyph scale of the title; other text is drawn at scale 1
    pub title_scale: i64,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            margin: 60,
            background: colors::WHITE,
            point_radius: 3,
            line_width: 2,
            ticks: 5,
            title_scale: 2,
        }
    }
}

/// Data range mapped onto the plotting area
#[derive(Debug, Clone, Copy)]
struct Frame {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl Frame {
    fn fit(series: &[RegressionSeries], config: &PlotConfig) -> Self {
        let points = series
            .iter()
            .flat_map(|s| s.actual.iter().chain(s.fitted.iter()))
            .filter(|(x, y)| x.is_finite() && y.is_finite());

        let (mut x_min, mut x_max, mut y_min, mut y_max) =
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
        for &(x, y) in points {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
        if !x_min.is_finite() {
            (x_min, x_max, y_min, y_max) = (0.0, 1.0, 0.0, 1.0);
        }

        let (x_min, x_max) = pad(x_min, x_max);
        let (y_min, y_max) = pad(y_min, y_max);
        let m = config.margin as f64;

        Self {
            x_min,
            x_max,
            y_min,
            y_max,
            left: m + Y_AXIS_GUTTER,
            right: config.width as f64 - m / 2.0,
            top: m / 2.0,
            bottom: config.height as f64 - m,
        }
    }

    fn to_pixel(&self, x: f64, y: f64) -> (i64, i64) {
        let px = self.left + (x - self.x_min) / (self.x_max - self.x_min) * (self.right - self.left);
        let py = self.bottom - (y - self.y_min) / (self.y_max - self.y_min) * (self.bottom - self.top);
        (px.round() as i64, py.round() as i64)
    }
}

/// Extra room left of the plotting area for the rotated y label
const Y_AXIS_GUTTER: f64 = 24.0;

/// Glyph cell size in pixels at scale 1
const GLYPH: i64 = 8;

/// Widen a range by 5% on each side; a degenerate range becomes `v ± 1`
fn pad(min: f64, max: f64) -> (f64, f64) {
    let span = max - min;
    if span <= f64::EPSILON * max.abs().max(1.0) {
        (min - 1.0, max + 1.0)
    } else {
        (min - span * 0.05, max + span * 0.05)
    }
}

/// Regression chart renderer
#[derive(Debug, Clone, Default)]
pub struct RegressionPlot {
    config: PlotConfig,
}

impl RegressionPlot {
    pub fn new(config: PlotConfig) -> Self {
        Self { config }
    }

    /// Create a renderer for the given image size
    pub fn with_size(width: u32, height: u32) -> Self {
        Self::new(PlotConfig {
            width,
            height,
            ..Default::default()
        })
    }

    /// Render the chart into an image
    pub fn render(&self, series: &[RegressionSeries]) -> RgbImage {
        let cfg = &self.config;
        let mut img = RgbImage::from_pixel(cfg.width, cfg.height, cfg.background);
        let frame = Frame::fit(series, cfg);

        self.draw_grid(&mut img, &frame);

        for (i, s) in series.iter().enumerate() {
            let scatter_color = colors::CYCLE[(2 * i) % colors::CYCLE.len()];
            let line_color = colors::CYCLE[(2 * i + 1) % colors::CYCLE.len()];

            for &(x, y) in s.actual.iter().filter(|(x, y)| x.is_finite() && y.is_finite()) {
                let (px, py) = frame.to_pixel(x, y);
                fill_circle(&mut img, px, py, cfg.point_radius, scatter_color);
            }

            let line: Vec<(i64, i64)> = s
                .fitted
                .iter()
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .map(|&(x, y)| frame.to_pixel(x, y))
                .collect();
            for w in line.windows(2) {
                draw_line(&mut img, w[0], w[1], cfg.line_width, line_color);
            }
        }

        self.draw_legend(&mut img, series);
        self.draw_labels(&mut img, &frame);
        img
    }

    /// Render the chart and write it as PNG
    pub fn save(&self, series: &[RegressionSeries], path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AnalyzerError::io(parent, e))?;
        }
        self.render(series).save(path)?;
        info!("Saved regression plot to {:?}", path);
        Ok(())
    }

    fn draw_grid(&self, img: &mut RgbImage, frame: &Frame) {
        let (left, right) = (frame.left.round() as i64, frame.right.round() as i64);
        let (top, bottom) = (frame.top.round() as i64, frame.bottom.round() as i64);
        let ticks = self.config.ticks.max(1) as i64;

        let x_step = (frame.x_max - frame.x_min) / ticks as f64;
        let y_step = (frame.y_max - frame.y_min) / ticks as f64;

        for t in 0..=ticks {
            let x = left + (right - left) * t / ticks;
            let y = bottom - (bottom - top) * t / ticks;
            draw_line(img, (x, top), (x, bottom), 1, colors::GRID);
            draw_line(img, (left, y), (right, y), 1, colors::GRID);
            draw_line(img, (x, bottom), (x, bottom + 6), 1, colors::BLACK);
            draw_line(img, (left - 6, y), (left, y), 1, colors::BLACK);

            let x_text = format_tick(frame.x_min + x_step * t as f64, x_step);
            draw_text(img, x - text_width(&x_text, 1) / 2, bottom + 10, &x_text, 1, colors::BLACK);

            let y_text = format_tick(frame.y_min + y_step * t as f64, y_step);
            draw_text(img, left - 9 - text_width(&y_text, 1), y - GLYPH / 2, &y_text, 1, colors::BLACK);
        }

        draw_line(img, (left, top), (left, bottom), 1, colors::BLACK);
        draw_line(img, (left, bottom), (right, bottom), 1, colors::BLACK);
    }

    /// Title above the plotting area, x label below the ticks, y label rotated
    fn draw_labels(&self, img: &mut RgbImage, frame: &Frame) {
        let scale = self.config.title_scale.max(1);
        let center = ((frame.left + frame.right) / 2.0).round() as i64;
        let title_y = ((frame.top - (GLYPH * scale) as f64) / 2.0).round() as i64;
        draw_text(img, center - text_width(TITLE, scale) / 2, title_y, TITLE, scale, colors::BLACK);

        let bottom = frame.bottom.round() as i64;
        draw_text(img, center - text_width(X_LABEL, 1) / 2, bottom + 26, X_LABEL, 1, colors::BLACK);

        let middle = ((frame.top + frame.bottom) / 2.0).round() as i64;
        draw_text_vertical(img, 6, middle + text_width(Y_LABEL, 1) / 2, Y_LABEL, colors::BLACK);
    }

    /// Legend box in the upper-left corner: a dot and a dash per channel, each
    /// followed by its text
    fn draw_legend(&self, img: &mut RgbImage, series: &[RegressionSeries]) {
        if series.is_empty() {
            return;
        }
        let entries: Vec<[String; 2]> = series.iter().map(|s| legend_entries(&s.channel)).collect();
        let longest = entries.iter().flatten().map(|e| text_width(e, 1)).max().unwrap_or(0);

        let x0 = (self.config.margin as f64 + Y_AXIS_GUTTER) as i64 + 12;
        let y0 = self.config.margin as i64 / 2 + 12;
        let row = 16;
        let width = 44 + longest + 8;
        let height = row * 2 * series.len() as i64 + 8;

        fill_rect(img, x0, y0, width, height, colors::WHITE);
        stroke_rect(img, x0, y0, width, height, colors::LEGEND_BORDER);

        for (i, [scatter_text, line_text]) in entries.iter().enumerate() {
            let scatter_y = y0 + 12 + row * (2 * i as i64);
            let line_y = scatter_y + row;
            fill_circle(img, x0 + 22, scatter_y, self.config.point_radius, colors::CYCLE[(2 * i) % 6]);
            draw_line(img, (x0 + 8, line_y), (x0 + 36, line_y), self.config.line_width, colors::CYCLE[(2 * i + 1) % 6]);
            draw_text(img, x0 + 44, scatter_y - GLYPH / 2, scatter_text, 1, colors::BLACK);
            draw_text(img, x0 + 44, line_y - GLYPH / 2, line_text, 1, colors::BLACK);
        }
    }
}

/// Tick text with as many decimals as the tick step needs
fn format_tick(value: f64, step: f64) -> String {
    let magnitude = value.abs().max(step.abs());
    if magnitude >= 1e5 || (step.abs() > 0.0 && step.abs() < 1e-3) {
        return format!("{:.1e}", value);
    }
    let decimals = if step.abs() > 0.0 {
        (-step.abs().log10()).ceil().clamp(0.0, 3.0) as usize
    } else {
        0
    };
    let text = format!("{:.*}", decimals, value);
    // avoid "-0.00"
    if text.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        text.trim_start_matches('-').to_string()
    } else {
        text
    }
}

fn text_width(text: &str, scale: i64) -> i64 {
    text.chars().count() as i64 * GLYPH * scale
}

/// Draw text left to right with its top-left corner at `(x, y)`
fn draw_text(img: &mut RgbImage, x: i64, y: i64, text: &str, scale: i64, color: Rgb<u8>) {
    for (k, ch) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch) else {
            continue;
        };
        let origin = x + k as i64 * GLYPH * scale;
        for (gy, bits) in glyph.iter().enumerate() {
            for gx in 0..GLYPH {
                if bits & (1 << gx) != 0 {
                    fill_rect(img, origin + gx * scale, y + gy as i64 * scale, scale, scale, color);
                }
            }
        }
    }
}

/// Draw text rotated a quarter turn counter-clockwise, reading bottom to top
/// from `(x, y)`
fn draw_text_vertical(img: &mut RgbImage, x: i64, y: i64, text: &str, color: Rgb<u8>) {
    for (k, ch) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch) else {
            continue;
        };
        let origin = y - k as i64 * GLYPH;
        for (gy, bits) in glyph.iter().enumerate() {
            for gx in 0..GLYPH {
                if bits & (1 << gx) != 0 {
                    put(img, x + gy as i64, origin - gx, color);
                }
            }
        }
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_circle(img: &mut RgbImage, cx: i64, cy: i64, r: i64, color: Rgb<u8>) {
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                put(img, cx + dx, cy + dy, color);
            }
        }
    }
}

fn fill_rect(img: &mut RgbImage, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
    for py in y..y + h {
        for px in x..x + w {
            put(img, px, py, color);
        }
    }
}

fn stroke_rect(img: &mut RgbImage, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
    draw_line(img, (x, y), (x + w, y), 1, color);
    draw_line(img, (x, y + h), (x + w, y + h), 1, color);
    draw_line(img, (x, y), (x, y + h), 1, color);
    draw_line(img, (x + w, y), (x + w, y + h), 1, color);
}

/// Bresenham line with a square brush of `width` pixels
fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), width: i64, color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    let half = (width - 1) / 2;

    loop {
        for oy in -half..=(width - 1 - half) {
            for ox in -half..=(width - 1 - half) {
                put(img, x + ox, y + oy, color);
            }
        }
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
