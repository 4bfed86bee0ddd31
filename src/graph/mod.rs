//! Frame-graph building and execution.

mod builder;
mod executor;
mod pass;

pub use builder::{FrameGraph, build_frame_graph};
pub use executor::FrameContext;
pub use pass::{FrameHooks, NoHooks, PassKind, RenderPass};
