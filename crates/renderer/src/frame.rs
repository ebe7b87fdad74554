//! Map frames for the forecast animation.
//!
//! One frame shows one run's field over the view box on a fixed color scale,
//! with optional isolines, a one-degree graticule, the view outline and a
//! colorbar. Titles and tick labels are drawn only when a font is loaded.

use chrono::{DateTime, Duration, Utc};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use rayon::prelude::*;
use tracing::debug;

use forecast_common::{BoundingBox, ForecastError, ForecastResult, ModelCycle, VariablePreset};
use grib_reader::Field;

use crate::colormap::{Color, Colormap};
use crate::contour::{contour_levels, generate_contours, Contour};
use crate::text::{draw_label, draw_text, draw_text_centered, format_value, SharedFont};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const NO_DATA: Color = Color::rgb(220, 220, 220);
const CONTOUR_COLOR: Rgba<u8> = Rgba([70, 70, 70, 255]);
const OUTLINE_COLOR: Rgba<u8> = Rgba([220, 0, 0, 255]);
const FRAME_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

const MARGIN: u32 = 12;
const COLORBAR_WIDTH: u32 = 20;
const COLORBAR_GAP: u32 = 16;
const TITLE_SIZE: f32 = 18.0;
const LABEL_SIZE: f32 = 12.0;

/// Shortest isoline, in grid cells, that gets a value label.
const MIN_LABELLED_CONTOUR: f32 = 4.0;

/// What the frame is showing: which run, for which target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMeta {
    pub cycle: ModelCycle,
    pub target: DateTime<Utc>,
    /// Whole hours from cycle to target
    pub lead_hours: u32,
    /// Lead actually fetched after snapping to the archive's step
    pub resolved_lead_hours: u32,
}

impl FrameMeta {
    pub fn new(cycle: ModelCycle, target: DateTime<Utc>, lead_hours: u32, resolved_lead_hours: u32) -> Self {
        Self {
            cycle,
            target,
            lead_hours,
            resolved_lead_hours,
        }
    }

    pub fn valid_time(&self) -> DateTime<Utc> {
        self.cycle.datetime() + Duration::hours(self.resolved_lead_hours as i64)
    }

    /// Two title lines: target (plus data time when snapping moved it), then run.
    pub fn title_lines(&self, title: &str) -> [String; 2] {
        let valid = self.valid_time();
        let time_info = if valid != self.target {
            let diff = (valid - self.target).num_hours();
            format!(" (data: {} UTC, diff: {:+}h)", valid.format("%H:00"), diff)
        } else {
            String::new()
        };

        [
            format!(
                "{} - Forecast for {}{}",
                title,
                self.target.format("%d/%m/%Y %H:00 UTC"),
                time_info
            ),
            format!(
                "Run: {} ({}h ahead)",
                self.cycle.datetime().format("%d/%m/%Y %H:00 UTC"),
                self.lead_hours
            ),
        ]
    }
}

/// Fixed visual settings shared by every frame of one animation.
#[derive(Clone)]
pub struct FrameStyle {
    pub width: u32,
    pub height: u32,
    pub view: BoundingBox,
    /// Color scale range in display units
    pub value_range: (f32, f32),
    /// Number of isolines (0 disables them)
    pub contour_levels: usize,
    /// Decimals in isoline and colorbar labels
    pub label_decimals: usize,
    pub colormap: Colormap,
    pub title: String,
    pub units: String,
    pub font: Option<SharedFont>,
}

impl FrameStyle {
    pub const DEFAULT_WIDTH: u32 = 960;
    pub const DEFAULT_HEIGHT: u32 = 800;

    /// Display conventions for `preset` over the Piemonte view.
    pub fn for_preset(preset: VariablePreset) -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            view: BoundingBox::PIEMONTE_VIEW,
            value_range: preset.value_range(),
            contour_levels: preset.contour_levels(),
            label_decimals: if preset.converts_kelvin_to_celsius() { 1 } else { 0 },
            colormap: Colormap::for_preset(preset),
            title: preset.title().to_string(),
            units: preset.units().to_string(),
            font: None,
        }
    }

    pub fn with_font(mut self, font: Option<SharedFont>) -> Self {
        self.font = font;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_view(mut self, view: BoundingBox) -> Self {
        self.view = view;
        self
    }

    fn layout(&self) -> ForecastResult<Layout> {
        let labelled = self.font.is_some();
        let top = if labelled { 64 } else { MARGIN };
        let bottom = if labelled { 28 } else { MARGIN };
        let left = if labelled { 48 } else { MARGIN };
        let right = COLORBAR_GAP + COLORBAR_WIDTH + if labelled { 64 } else { MARGIN };

        let map_width = self.width.saturating_sub(left + right);
        let map_height = self.height.saturating_sub(top + bottom);
        if map_width < 16 || map_height < 16 {
            return Err(ForecastError::RenderError(format!(
                "frame {}x{} is too small",
                self.width, self.height
            )));
        }
        if self.view.width() <= 0.0 || self.view.height() <= 0.0 {
            return Err(ForecastError::RenderError("empty view box".to_string()));
        }

        Ok(Layout {
            map_x: left,
            map_y: top,
            map_width,
            map_height,
            colorbar_x: left + map_width + COLORBAR_GAP,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    map_x: u32,
    map_y: u32,
    map_width: u32,
    map_height: u32,
    colorbar_x: u32,
}

/// Geographic to map-pixel conversion for the view box.
#[derive(Debug, Clone, Copy)]
struct Projector {
    view: BoundingBox,
    width: f64,
    height: f64,
}

impl Projector {
    fn to_pixel(&self, lon: f64, lat: f64) -> (f32, f32) {
        let x = (lon - self.view.min_lon) / self.view.width() * self.width;
        let y = (self.view.max_lat - lat) / self.view.height() * self.height;
        (x as f32, y as f32)
    }

    /// Geographic position of a pixel center.
    fn to_geo(&self, px: u32, py: u32) -> (f64, f64) {
        let lon = self.view.min_lon + (px as f64 + 0.5) / self.width * self.view.width();
        let lat = self.view.max_lat - (py as f64 + 0.5) / self.height * self.view.height();
        (lon, lat)
    }
}

/// Render one field into a frame.
pub fn render_frame(field: &Field, meta: &FrameMeta, style: &FrameStyle) -> ForecastResult<RgbaImage> {
    let layout = style.layout()?;
    let projector = Projector {
        view: style.view,
        width: layout.map_width as f64,
        height: layout.map_height as f64,
    };

    let mut map = fill_map(field, style, &projector, layout.map_width, layout.map_height)?;

    if style.contour_levels > 0 {
        let (min, max) = style.value_range;
        let levels = contour_levels(min, max, style.contour_levels);
        let contours = generate_contours(&field.values, field.width, field.height, &levels);
        debug!(count = contours.len(), cycle = %meta.cycle, "Drawing isolines");
        draw_contours(&mut map, field, &contours, &projector, style);
    }

    draw_graticule(&mut map, &projector);

    let mut canvas = RgbaImage::from_pixel(style.width, style.height, BACKGROUND);
    imageops::replace(&mut canvas, &map, layout.map_x as i64, layout.map_y as i64);

    // view outline, 2 px
    for inset in 0..2 {
        let rect = Rect::at(layout.map_x as i32 - inset - 1, layout.map_y as i32 - inset - 1)
            .of_size(layout.map_width + 2 + 2 * inset as u32, layout.map_height + 2 + 2 * inset as u32);
        draw_hollow_rect_mut(&mut canvas, rect, OUTLINE_COLOR);
    }

    draw_colorbar(&mut canvas, &layout, style);

    if let Some(font) = &style.font {
        let [line1, line2] = meta.title_lines(&style.title);
        let center = style.width as i32 / 2;
        draw_text_centered(&mut canvas, font, TITLE_SIZE, TEXT_COLOR, center, 10, &line1);
        draw_text_centered(&mut canvas, font, TITLE_SIZE, TEXT_COLOR, center, 34, &line2);
        draw_axis_labels(&mut canvas, &layout, &projector, style);
    }

    Ok(canvas)
}

/// Color every map pixel from the nearest grid cell, rows in parallel.
fn fill_map(
    field: &Field,
    style: &FrameStyle,
    projector: &Projector,
    width: u32,
    height: u32,
) -> ForecastResult<RgbaImage> {
    let (min, max) = style.value_range;
    let colormap = style.colormap;
    let row_len = width as usize * 4;
    let mut pixels = vec![0u8; row_len * height as usize];

    pixels
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(py, row)| {
            for (px, pixel) in row.chunks_exact_mut(4).enumerate() {
                let (lon, lat) = projector.to_geo(px as u32, py as u32);
                let color = field
                    .value_at(lon, lat)
                    .and_then(|v| colormap.color_for(v, min, max))
                    .unwrap_or(NO_DATA);
                pixel.copy_from_slice(&[color.r, color.g, color.b, color.a]);
            }
        });

    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| ForecastError::RenderError("map buffer size mismatch".to_string()))
}

fn draw_contours(
    map: &mut RgbaImage,
    field: &Field,
    contours: &[Contour],
    projector: &Projector,
    style: &FrameStyle,
) {
    let grid_to_pixel = |x: f32, y: f32| {
        projector.to_pixel(
            field.lon0 + x as f64 * field.dlon,
            field.lat0 + y as f64 * field.dlat,
        )
    };

    for contour in contours {
        for pair in contour.points.windows(2) {
            let start = grid_to_pixel(pair[0].x, pair[0].y);
            let end = grid_to_pixel(pair[1].x, pair[1].y);
            draw_line_segment_mut(map, start, end, CONTOUR_COLOR);
        }
    }

    let Some(font) = &style.font else { return };
    for contour in contours.iter().filter(|c| c.length() >= MIN_LABELLED_CONTOUR) {
        let Some(mid) = contour.midpoint() else { continue };
        let (x, y) = grid_to_pixel(mid.x, mid.y);
        if x < 0.0 || y < 0.0 || x >= map.width() as f32 || y >= map.height() as f32 {
            continue;
        }
        let text = format_value(contour.level, style.label_decimals);
        draw_label(map, font, LABEL_SIZE, CONTOUR_COLOR, x as i32, y as i32, &text);
    }
}

/// Whole degrees inside `min..=max`.
fn whole_degrees(min: f64, max: f64) -> impl Iterator<Item = i32> {
    (min.ceil() as i32)..=(max.floor() as i32)
}

fn draw_graticule(map: &mut RgbaImage, projector: &Projector) {
    let view = projector.view;
    let (w, h) = (map.width(), map.height());

    for lon in whole_degrees(view.min_lon, view.max_lon) {
        let (x, _) = projector.to_pixel(lon as f64, view.max_lat);
        let x = x.round() as u32;
        if x < w {
            for y in 0..h {
                blend_pixel(map, x, y, Rgba([0, 0, 0, 255]), 0.3);
            }
        }
    }

    for lat in whole_degrees(view.min_lat, view.max_lat) {
        let (_, y) = projector.to_pixel(view.min_lon, lat as f64);
        let y = y.round() as u32;
        if y < h {
            for x in 0..w {
                blend_pixel(map, x, y, Rgba([0, 0, 0, 255]), 0.3);
            }
        }
    }
}

fn blend_pixel(img: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>, alpha: f32) {
    let px = img.get_pixel_mut(x, y);
    for c in 0..3 {
        px.0[c] = (px.0[c] as f32 * (1.0 - alpha) + color.0[c] as f32 * alpha).round() as u8;
    }
}

fn draw_colorbar(canvas: &mut RgbaImage, layout: &Layout, style: &FrameStyle) {
    let x0 = layout.colorbar_x;
    let y0 = layout.map_y;
    let h = layout.map_height;

    for dy in 0..h {
        let t = 1.0 - dy as f32 / (h - 1).max(1) as f32;
        let color = style.colormap.color_at(t).to_rgba();
        for dx in 0..COLORBAR_WIDTH {
            canvas.put_pixel(x0 + dx, y0 + dy, color);
        }
    }

    let rect = Rect::at(x0 as i32, y0 as i32).of_size(COLORBAR_WIDTH, h);
    draw_hollow_rect_mut(canvas, rect, FRAME_COLOR);

    let Some(font) = &style.font else { return };
    let (min, max) = style.value_range;
    let ticks = 5;
    for i in 0..ticks {
        let frac = i as f32 / (ticks - 1) as f32;
        let value = max - frac * (max - min);
        let y = y0 as f32 + frac * (h - 1) as f32;
        let x = (x0 + COLORBAR_WIDTH) as f32;
        draw_line_segment_mut(canvas, (x, y), (x + 4.0, y), FRAME_COLOR);
        draw_text(
            canvas,
            font,
            LABEL_SIZE,
            TEXT_COLOR,
            x as i32 + 6,
            y as i32 - LABEL_SIZE as i32 / 2,
            &format_value(value, style.label_decimals),
        );
    }
    draw_text_centered(
        canvas,
        font,
        LABEL_SIZE,
        TEXT_COLOR,
        (x0 + COLORBAR_WIDTH / 2) as i32,
        y0 as i32 - LABEL_SIZE as i32 - 4,
        &style.units,
    );
}

fn draw_axis_labels(canvas: &mut RgbaImage, layout: &Layout, projector: &Projector, style: &FrameStyle) {
    let Some(font) = &style.font else { return };
    let view = projector.view;

    for lon in whole_degrees(view.min_lon, view.max_lon) {
        let (x, _) = projector.to_pixel(lon as f64, view.max_lat);
        draw_text_centered(
            canvas,
            font,
            LABEL_SIZE,
            TEXT_COLOR,
            layout.map_x as i32 + x as i32,
            (layout.map_y + layout.map_height) as i32 + 6,
            &format!("{}°E", lon),
        );
    }

    for lat in whole_degrees(view.min_lat, view.max_lat) {
        let (_, y) = projector.to_pixel(view.min_lon, lat as f64);
        draw_text(
            canvas,
            font,
            LABEL_SIZE,
            TEXT_COLOR,
            4,
            layout.map_y as i32 + y as i32 - LABEL_SIZE as i32 / 2,
            &format!("{}°N", lat),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::time::utc;

    #[test]
    fn test_title_without_snapping() {
        let meta = FrameMeta::new(ModelCycle::floor(utc(2024, 1, 10, 12)), utc(2024, 1, 11, 6), 18, 18);
        let [line1, line2] = meta.title_lines("Geopotential height 500 hPa");
        assert_eq!(line1, "Geopotential height 500 hPa - Forecast for 11/01/2024 06:00 UTC");
        assert_eq!(line2, "Run: 10/01/2024 12:00 UTC (18h ahead)");
    }

    #[test]
    fn test_title_reports_snapped_valid_time() {
        let meta = FrameMeta::new(ModelCycle::floor(utc(2024, 1, 1, 0)), utc(2024, 1, 6, 5), 125, 120);
        let [line1, _] = meta.title_lines("Precipitation");
        assert!(line1.ends_with("(data: 00:00 UTC, diff: -5h)"), "{}", line1);
    }

    #[test]
    fn test_layout_rejects_tiny_frames() {
        let style = FrameStyle::for_preset(VariablePreset::Hgt500).with_size(40, 40);
        assert!(style.layout().is_err());
    }

    #[test]
    fn test_projector_round_trip() {
        let projector = Projector {
            view: BoundingBox::PIEMONTE_VIEW,
            width: 280.0,
            height: 260.0,
        };
        let (lon, lat) = projector.to_geo(0, 0);
        assert!((lon - 6.505).abs() < 1e-9);
        assert!((lat - 46.595).abs() < 1e-9);

        let (x, y) = projector.to_pixel(9.3, 44.0);
        assert!((x - 280.0).abs() < 1e-3);
        assert!((y - 260.0).abs() < 1e-3);
    }
}
