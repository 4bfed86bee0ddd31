//! Aurora is the per-frame scheduling core of a real-time renderer: shader
//! variant caching, draw-call preparation and dispatch, layer composition,
//! and a frame graph that batches same-target work into minimal render
//! passes.
//!
//! Everything GPU-facing goes through the [`device::GraphicsDevice`] trait;
//! the crate itself carries no graphics API binding.
//!
//! A frame flows through four stages:
//!
//! 1. [`scene::LayerComposition::build_render_actions`] flattens layers and
//!    cameras into render actions,
//! 2. [`graph::build_frame_graph`] groups actions into passes,
//! 3. [`renderer::prepare_draws`] resolves each draw's shader variant via
//!    the [`shader::ShaderVariantCache`], and
//! 4. [`FrameGraph::execute`](graph::FrameGraph::execute) dispatches it all
//!    through a tracked encoder that drops redundant state changes.

pub mod device;
pub mod errors;
pub mod graph;
pub mod renderer;
pub mod scene;
pub mod shader;

pub use errors::{RenderError, Result};
pub use graph::{FrameContext, FrameGraph, build_frame_graph};
pub use renderer::{FrameStats, RendererSettings};
pub use scene::{LayerComposition, Scene};
pub use shader::ShaderVariantCache;
