//! Line chart of one scalar per forecast run.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use forecast_common::{ForecastError, ForecastResult};

use crate::text::{draw_text, draw_text_centered, format_value, SharedFont};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const GRID_COLOR: Rgba<u8> = Rgba([225, 225, 225, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

const TITLE_SIZE: f32 = 16.0;
const LABEL_SIZE: f32 = 12.0;
const MARKER_RADIUS: i32 = 4;
const Y_TICKS: usize = 5;

/// One labelled value on the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

impl ChartPoint {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

#[derive(Clone)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    /// Title lines, drawn only when a font is loaded
    pub title: Vec<String>,
    pub y_label: String,
    pub line_color: Rgba<u8>,
    pub marker_color: Rgba<u8>,
    /// Dashed vertical line marking the last point
    pub reference_color: Rgba<u8>,
    pub font: Option<SharedFont>,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 400,
            title: Vec::new(),
            y_label: String::new(),
            line_color: Rgba([0x2e, 0x86, 0xab, 255]),
            marker_color: Rgba([0xa2, 0x3b, 0x72, 255]),
            reference_color: Rgba([220, 0, 0, 255]),
            font: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl PlotArea {
    fn x_at(&self, index: usize, count: usize) -> f32 {
        if count <= 1 {
            return (self.left + self.right) / 2.0;
        }
        // half a slot of padding on both ends
        let slot = (self.right - self.left) / count as f32;
        self.left + slot * (index as f32 + 0.5)
    }

    fn y_at(&self, value: f64, (min, max): (f64, f64)) -> f32 {
        let t = ((value - min) / (max - min)).clamp(0.0, 1.0) as f32;
        self.bottom - t * (self.bottom - self.top)
    }
}

/// Y axis range: zero up to 10% above the largest value.
fn value_range(points: &[ChartPoint]) -> (f64, f64) {
    let max = points
        .iter()
        .map(|p| p.value)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    let min = points
        .iter()
        .map(|p| p.value)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::min);

    if max - min < f64::EPSILON {
        (min, min + 1.0)
    } else {
        (min, max * 1.1)
    }
}

/// Draw markers joined by a polyline, one slot per point, in input order.
pub fn render_line_chart(points: &[ChartPoint], style: &ChartStyle) -> ForecastResult<RgbaImage> {
    if points.is_empty() {
        return Err(ForecastError::RenderError("chart has no points".to_string()));
    }

    let labelled = style.font.is_some();
    let area = PlotArea {
        left: if labelled { 80.0 } else { 16.0 },
        top: if labelled { 56.0 } else { 16.0 },
        right: style.width as f32 - 24.0,
        bottom: style.height as f32 - if labelled { 48.0 } else { 16.0 },
    };
    if area.right - area.left < 32.0 || area.bottom - area.top < 32.0 {
        return Err(ForecastError::RenderError(format!(
            "chart {}x{} is too small",
            style.width, style.height
        )));
    }

    let range = value_range(points);
    let mut img = RgbaImage::from_pixel(style.width, style.height, BACKGROUND);

    // horizontal grid
    for i in 0..Y_TICKS {
        let value = range.0 + (range.1 - range.0) * i as f64 / (Y_TICKS - 1) as f64;
        let y = area.y_at(value, range);
        draw_line_segment_mut(&mut img, (area.left, y), (area.right, y), GRID_COLOR);
    }

    // axes
    draw_line_segment_mut(&mut img, (area.left, area.top), (area.left, area.bottom), AXIS_COLOR);
    draw_line_segment_mut(&mut img, (area.left, area.bottom), (area.right, area.bottom), AXIS_COLOR);

    let count = points.len();
    let last_x = area.x_at(count - 1, count);
    draw_dashed_vline(&mut img, last_x, area.top, area.bottom, style.reference_color);

    let coords: Vec<Option<(f32, f32)>> = points
        .iter()
        .enumerate()
        .map(|(i, p)| p.value.is_finite().then(|| (area.x_at(i, count), area.y_at(p.value, range))))
        .collect();

    for pair in coords.windows(2) {
        if let [Some(a), Some(b)] = pair {
            // 2 px wide
            draw_line_segment_mut(&mut img, *a, *b, style.line_color);
            draw_line_segment_mut(&mut img, (a.0, a.1 + 1.0), (b.0, b.1 + 1.0), style.line_color);
        }
    }

    for (x, y) in coords.iter().flatten() {
        draw_filled_circle_mut(&mut img, (*x as i32, *y as i32), MARKER_RADIUS, style.marker_color);
    }

    if let Some(font) = &style.font {
        let center = style.width as i32 / 2;
        for (i, line) in style.title.iter().enumerate() {
            let y = 8 + i as i32 * (TITLE_SIZE as i32 + 4);
            draw_text_centered(&mut img, font, TITLE_SIZE, TEXT_COLOR, center, y, line);
        }

        for i in 0..Y_TICKS {
            let value = range.0 + (range.1 - range.0) * i as f64 / (Y_TICKS - 1) as f64;
            let y = area.y_at(value, range) as i32 - LABEL_SIZE as i32 / 2;
            draw_text(&mut img, font, LABEL_SIZE, TEXT_COLOR, 24, y, &format_value(value as f32, 1));
        }

        for (i, point) in points.iter().enumerate() {
            let x = area.x_at(i, count) as i32;
            draw_text_centered(&mut img, font, LABEL_SIZE, TEXT_COLOR, x, area.bottom as i32 + 8, &point.label);
        }

        if !style.y_label.is_empty() {
            draw_text(&mut img, font, LABEL_SIZE, TEXT_COLOR, 4, area.top as i32 - 20, &style.y_label);
        }
    }

    Ok(img)
}

fn draw_dashed_vline(img: &mut RgbaImage, x: f32, top: f32, bottom: f32, color: Rgba<u8>) {
    const DASH: f32 = 6.0;
    const GAP: f32 = 4.0;

    let mut y = top;
    while y < bottom {
        let end = (y + DASH).min(bottom);
        draw_line_segment_mut(img, (x, y), (x, end), color);
        y = end + GAP;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_range_starts_at_zero() {
        let points = vec![ChartPoint::new("a", 12.0), ChartPoint::new("b", 0.0)];
        let (min, max) = value_range(&points);
        assert_eq!(min, 0.0);
        assert!((max - 13.2).abs() < 1e-9);
    }

    #[test]
    fn test_value_range_flat_series() {
        let points = vec![ChartPoint::new("a", 0.0), ChartPoint::new("b", 0.0)];
        assert_eq!(value_range(&points), (0.0, 1.0));
    }

    #[test]
    fn test_slots_are_centered() {
        let area = PlotArea {
            left: 0.0,
            top: 0.0,
            right: 100.0,
            bottom: 100.0,
        };
        assert_eq!(area.x_at(0, 2), 25.0);
        assert_eq!(area.x_at(1, 2), 75.0);
        assert_eq!(area.x_at(0, 1), 50.0);
    }
}
