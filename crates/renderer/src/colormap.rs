//! Color scales for forecast fields.
//!
//! Values are normalized against the preset's fixed display range before
//! lookup, so every frame of an animation uses the same scale.

use forecast_common::{Variable, VariablePreset};

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

/// Linear color interpolation, `t` clamped to 0..1
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;
    let mix = |a: u8, b: u8| (a as f32 * t_inv + b as f32 * t).round() as u8;
    Color::new(
        mix(color1.r, color2.r),
        mix(color1.g, color2.g),
        mix(color1.b, color2.b),
        mix(color1.a, color2.a),
    )
}

/// Map `value` into 0..1 against [min, max].
///
/// Out-of-range values are clamped; NaN yields None.
pub fn normalize(value: f32, min: f32, max: f32) -> Option<f32> {
    if value.is_nan() {
        return None;
    }
    let range = max - min;
    let range = if range.abs() < 0.001 { 1.0 } else { range };
    Some(((value - min) / range).clamp(0.0, 1.0))
}

// ColorBrewer RdYlBu, reversed (blue for low values)
const RD_YL_BU_R: [Color; 11] = [
    Color::rgb(0x31, 0x36, 0x95),
    Color::rgb(0x45, 0x75, 0xb4),
    Color::rgb(0x74, 0xad, 0xd1),
    Color::rgb(0xab, 0xd9, 0xe9),
    Color::rgb(0xe0, 0xf3, 0xf8),
    Color::rgb(0xff, 0xff, 0xbf),
    Color::rgb(0xfe, 0xe0, 0x90),
    Color::rgb(0xfd, 0xae, 0x61),
    Color::rgb(0xf4, 0x6d, 0x43),
    Color::rgb(0xd7, 0x30, 0x27),
    Color::rgb(0xa5, 0x00, 0x26),
];

// ColorBrewer Blues
const BLUES: [Color; 9] = [
    Color::rgb(0xf7, 0xfb, 0xff),
    Color::rgb(0xde, 0xeb, 0xf7),
    Color::rgb(0xc6, 0xdb, 0xef),
    Color::rgb(0x9e, 0xca, 0xe1),
    Color::rgb(0x6b, 0xae, 0xd6),
    Color::rgb(0x42, 0x92, 0xc6),
    Color::rgb(0x21, 0x71, 0xb5),
    Color::rgb(0x08, 0x51, 0x9c),
    Color::rgb(0x08, 0x30, 0x6b),
];

/// Continuous color scale evaluated on normalized values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    /// Diverging blue-yellow-red, used for heights and temperatures
    RdYlBuR,
    /// Sequential white-to-blue, used for precipitation
    Blues,
}

impl Colormap {
    pub fn for_preset(preset: VariablePreset) -> Self {
        match preset.variable() {
            Variable::Apcp => Colormap::Blues,
            Variable::Hgt | Variable::Tmp => Colormap::RdYlBuR,
        }
    }

    /// Evenly spaced stops from 0.0 to 1.0.
    pub fn stops(&self) -> &'static [Color] {
        match self {
            Colormap::RdYlBuR => &RD_YL_BU_R,
            Colormap::Blues => &BLUES,
        }
    }

    /// Color at normalized position `t` (clamped to 0..1).
    pub fn color_at(&self, t: f32) -> Color {
        let stops = self.stops();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let scaled = t * (stops.len() - 1) as f32;
        let lower = (scaled.floor() as usize).min(stops.len() - 2);
        interpolate_color(stops[lower], stops[lower + 1], scaled - lower as f32)
    }

    /// Color for a raw value against a display range, None for NaN.
    pub fn color_for(&self, value: f32, min: f32, max: f32) -> Option<Color> {
        normalize(value, min, max).map(|t| self.color_at(t))
    }
}
