//! Image rendering for forecast-evolution output.
//!
//! - Color scales for the fixed display ranges
//! - Isolines (marching squares)
//! - Map frames with graticule, outline and colorbar
//! - Animated GIF assembly
//! - Line charts and PNG encoding

pub mod animation;
pub mod chart;
pub mod colormap;
pub mod contour;
pub mod frame;
pub mod png;
pub mod text;

pub use animation::{encode_gif, write_gif, DEFAULT_FPS};
pub use chart::{render_line_chart, ChartPoint, ChartStyle};
pub use colormap::{Color, Colormap};
pub use frame::{render_frame, FrameMeta, FrameStyle};
pub use text::{load_font, SharedFont};
