//! Tests for frame, animation and chart rendering.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, Rgba, RgbaImage};

use forecast_common::{BoundingBox, ModelCycle, VariablePreset};
use grib_reader::Field;
use renderer::animation::{encode_gif, write_gif, DEFAULT_FPS};
use renderer::chart::{render_line_chart, ChartPoint, ChartStyle};
use renderer::colormap::Colormap;
use renderer::frame::{render_frame, FrameMeta, FrameStyle};
use test_utils::grid::GFS_SUBREGION;
use test_utils::time::{scenario_target, utc};
use test_utils::{create_constant_grid, create_height_grid, create_temperature_grid};

fn height_field() -> Field {
    let spec = GFS_SUBREGION;
    Field::new(
        spec.width,
        spec.height,
        create_height_grid(spec.width, spec.height),
        (spec.lon0, spec.lat0),
        (spec.dlon, spec.dlat),
    )
    .unwrap()
}

fn meta() -> FrameMeta {
    FrameMeta::new(ModelCycle::floor(utc(2024, 1, 10, 12)), scenario_target(), 18, 18)
}

fn small_style(preset: VariablePreset) -> FrameStyle {
    FrameStyle::for_preset(preset).with_size(200, 160)
}

// ============================================================================
// Frame tests
// ============================================================================

#[test]
fn test_frame_has_requested_size() {
    let frame = render_frame(&height_field(), &meta(), &small_style(VariablePreset::Hgt500)).unwrap();
    assert_eq!(frame.dimensions(), (200, 160));
}

#[test]
fn test_constant_field_fills_map_with_one_color() {
    let spec = GFS_SUBREGION;
    let field = Field::new(
        spec.width,
        spec.height,
        create_constant_grid(spec.width, spec.height, 25.0),
        (spec.lon0, spec.lat0),
        (spec.dlon, spec.dlat),
    )
    .unwrap();

    let style = small_style(VariablePreset::Apcp);
    let frame = render_frame(&field, &meta(), &style).unwrap();

    // halfway through the 0..50 mm scale
    let c = Colormap::Blues.color_at(0.5);
    let expected = Rgba([c.r, c.g, c.b, 255]);
    // a pixel inside the map, away from graticule lines and the outline
    assert_eq!(*frame.get_pixel(20, 20), expected);
}

#[test]
fn test_field_outside_view_is_no_data() {
    // grid over Spain does not reach the Piemonte view
    let field = Field::new(4, 4, vec![5600.0; 16], (-4.0, 42.0), (0.25, -0.25)).unwrap();
    let frame = render_frame(&field, &meta(), &small_style(VariablePreset::Hgt500)).unwrap();
    assert_eq!(*frame.get_pixel(20, 20), Rgba([220, 220, 220, 255]));
}

#[test]
fn test_view_outline_is_drawn() {
    let frame = render_frame(&height_field(), &meta(), &small_style(VariablePreset::Tmp850)).unwrap();
    // map starts at (12, 12) without a font; outline sits just outside it
    assert_eq!(*frame.get_pixel(11, 40), Rgba([220, 0, 0, 255]));
}

#[test]
fn test_temperature_frame_after_celsius_conversion() {
    let spec = GFS_SUBREGION;
    let mut field = Field::new(
        spec.width,
        spec.height,
        create_temperature_grid(spec.width, spec.height),
        (spec.lon0, spec.lat0),
        (spec.dlon, spec.dlat),
    )
    .unwrap();
    field.kelvin_to_celsius();

    let frame = render_frame(&field, &meta(), &small_style(VariablePreset::Tmp850)).unwrap();
    assert_ne!(*frame.get_pixel(20, 20), Rgba([220, 220, 220, 255]));
}

#[test]
fn test_frame_rejects_tiny_canvas() {
    let style = FrameStyle::for_preset(VariablePreset::Hgt500).with_size(30, 30);
    assert!(render_frame(&height_field(), &meta(), &style).is_err());
}

#[test]
fn test_custom_view() {
    let style = small_style(VariablePreset::Hgt500).with_view(BoundingBox::DOWNLOAD_REGION);
    assert!(render_frame(&height_field(), &meta(), &style).is_ok());
}

// ============================================================================
// Animation tests
// ============================================================================

#[test]
fn test_gif_has_one_frame_per_run() {
    let frames: Vec<RgbaImage> = (0..3)
        .map(|i| RgbaImage::from_pixel(8, 6, Rgba([i * 80, 0, 0, 255])))
        .collect();

    let gif = encode_gif(frames, DEFAULT_FPS).unwrap();
    assert_eq!(&gif[0..6], b"GIF89a");

    let decoder = GifDecoder::new(Cursor::new(gif)).unwrap();
    let decoded = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(decoded.len(), 3);
    assert_eq!(decoded[0].buffer().dimensions(), (8, 6));
}

#[test]
fn test_write_gif_creates_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forecast_20240111_06z_hgt500.gif");
    let frames = vec![RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255])); 2];

    let size = write_gif(&path, frames, DEFAULT_FPS).unwrap();
    assert!(size > 0);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), size);
}

// ============================================================================
// Chart tests
// ============================================================================

#[test]
fn test_chart_draws_markers() {
    let points = vec![
        ChartPoint::new("09/01 18:00", 42.0),
        ChartPoint::new("10/01 00:00", 30.5),
        ChartPoint::new("10/01 06:00", 12.0),
        ChartPoint::new("10/01 12:00", 0.0),
    ];
    let style = ChartStyle::default();
    let chart = render_line_chart(&points, &style).unwrap();
    assert_eq!(chart.dimensions(), (1000, 400));

    let marker = style.marker_color;
    assert!(chart.pixels().any(|p| *p == marker));
}

#[test]
fn test_chart_needs_points() {
    assert!(render_line_chart(&[], &ChartStyle::default()).is_err());
}
