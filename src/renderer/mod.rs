//! Per-frame draw preparation and dispatch.

mod dispatch;
mod lights;
mod prepare;
mod settings;
mod stats;

pub use dispatch::{dispatch_draws, set_view_uniforms};
pub use lights::{LightUniformBank, dispatch_ambient};
pub use prepare::{PreparedDraw, prepare_draws};
pub use settings::RendererSettings;
pub use stats::FrameStats;
