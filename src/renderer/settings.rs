//! Renderer configuration.

/// Frame-scheduler knobs, fixed for the lifetime of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererSettings {
    /// Upper bound on non-clustered local lights dispatched to one draw.
    pub max_lights_per_draw: usize,
    /// Shadow map resolution used when a light does not specify one.
    pub default_shadow_resolution: u32,
    /// Debug cap: stop submitting draws after this many in a frame. `None`
    /// disables the cap.
    pub skip_render_after: Option<u32>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            max_lights_per_draw: 4,
            default_shadow_resolution: 1024,
            skip_render_after: None,
        }
    }
}
