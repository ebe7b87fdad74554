//! Animated GIF assembly.

use std::path::Path;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use tracing::info;

use forecast_common::{ForecastError, ForecastResult};

/// Playback rate of the forecast animation.
pub const DEFAULT_FPS: f32 = 1.5;

/// Quantization speed handed to the GIF encoder (1 = best, 30 = fastest).
const ENCODER_SPEED: i32 = 10;

/// Per-frame display time for `fps`, rounded to whole milliseconds.
pub fn frame_delay_ms(fps: f32) -> ForecastResult<u32> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(ForecastError::RenderError(format!("invalid frame rate {}", fps)));
    }
    Ok((1000.0 / fps).round().max(1.0) as u32)
}

/// Encode frames into an infinitely looping GIF.
///
/// All frames must share the first frame's dimensions.
pub fn encode_gif(frames: Vec<RgbaImage>, fps: f32) -> ForecastResult<Vec<u8>> {
    let delay_ms = frame_delay_ms(fps)?;

    let Some(first) = frames.first() else {
        return Err(ForecastError::RenderError("no frames to encode".to_string()));
    };
    let dimensions = first.dimensions();
    if let Some(bad) = frames.iter().position(|f| f.dimensions() != dimensions) {
        return Err(ForecastError::RenderError(format!(
            "frame {} is {:?}, expected {:?}",
            bad,
            frames[bad].dimensions(),
            dimensions
        )));
    }

    let delay = Delay::from_numer_denom_ms(delay_ms, 1);
    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut buffer, ENCODER_SPEED);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ForecastError::RenderError(format!("GIF setup failed: {}", e)))?;
        encoder
            .encode_frames(frames.into_iter().map(|img| Frame::from_parts(img, 0, 0, delay)))
            .map_err(|e| ForecastError::RenderError(format!("GIF encoding failed: {}", e)))?;
    }

    Ok(buffer)
}

/// Encode `frames` and write the GIF to `path`.
///
/// Written to a sibling `.partial` file first, then renamed into place.
pub fn write_gif(path: &Path, frames: Vec<RgbaImage>, fps: f32) -> ForecastResult<u64> {
    let frame_count = frames.len();
    let bytes = encode_gif(frames, fps)?;
    write_atomic(path, &bytes)?;

    info!(
        path = %path.display(),
        frames = frame_count,
        size = bytes.len(),
        "Animation written"
    );
    Ok(bytes.len() as u64)
}

/// Write `bytes` to `{path}.partial` and rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> ForecastResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = std::path::PathBuf::from(partial);

    std::fs::write(&partial, bytes)?;
    if let Err(e) = std::fs::rename(&partial, path) {
        let _ = std::fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(())
}
