//! Text drawing for titles, labels and axis ticks.
//!
//! No font ships with the workspace; one is loaded from disk when the caller
//! asks for labelled output. Without a font, renderers skip all text.

use std::path::Path;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{point, Font, Scale};

use forecast_common::{ForecastError, ForecastResult};

/// Shared handle to a loaded TrueType font.
pub type SharedFont = Arc<Font<'static>>;

/// Load a TrueType/OpenType font from `path`.
pub fn load_font(path: &Path) -> ForecastResult<SharedFont> {
    let data = std::fs::read(path).map_err(|e| {
        ForecastError::RenderError(format!("cannot read font {}: {}", path.display(), e))
    })?;

    Font::try_from_vec(data)
        .map(Arc::new)
        .ok_or_else(|| ForecastError::RenderError(format!("{} is not a usable font", path.display())))
}

/// Pixel width of `text` at `size`.
pub fn text_width(font: &Font<'_>, size: f32, text: &str) -> i32 {
    let scale = Scale::uniform(size);
    font.layout(text, scale, point(0.0, 0.0))
        .filter_map(|g| g.pixel_bounding_box())
        .map(|bb| bb.max.x)
        .max()
        .unwrap_or(0)
}

/// Draw `text` with its top-left corner at (x, y).
pub fn draw_text(
    img: &mut RgbaImage,
    font: &Font<'_>,
    size: f32,
    color: Rgba<u8>,
    x: i32,
    y: i32,
    text: &str,
) {
    draw_text_mut(img, color, x, y, Scale::uniform(size), font, text);
}

/// Draw `text` horizontally centered on `center_x`.
pub fn draw_text_centered(
    img: &mut RgbaImage,
    font: &Font<'_>,
    size: f32,
    color: Rgba<u8>,
    center_x: i32,
    y: i32,
    text: &str,
) {
    let x = center_x - text_width(font, size, text) / 2;
    draw_text(img, font, size, color, x, y, text);
}

/// Draw text on a semi-transparent white box for readability over the map.
pub fn draw_label(
    img: &mut RgbaImage,
    font: &Font<'_>,
    size: f32,
    color: Rgba<u8>,
    center_x: i32,
    center_y: i32,
    text: &str,
) {
    let padding = 2;
    let width = text_width(font, size, text);
    let height = size as i32;
    let x = center_x - width / 2;
    let y = center_y - height / 2;

    let rect = Rect::at(x - padding, y - padding)
        .of_size((width + 2 * padding).max(1) as u32, (height + 2 * padding) as u32);
    draw_filled_rect_mut(img, rect, Rgba([255, 255, 255, 200]));
    draw_text(img, font, size, color, x, y, text);
}

/// Format a value for labels with a fixed number of decimals.
pub fn format_value(value: f32, decimals: usize) -> String {
    format!("{:.*}", decimals, value)
}
