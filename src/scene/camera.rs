//! Cameras.

use glam::{Mat4, Vec3};
use smallvec::SmallVec;

use crate::device::{ClearFlags, TargetHandle, Viewport};
use crate::shader::ShaderPass;

slotmap::new_key_type! {
    pub struct CameraKey;
}

/// Normalized viewport rectangle, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const FULL: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// A camera covering less than the full target must not clear it, or it
    /// would wipe what other cameras already rendered.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.width == 1.0 && self.height == 1.0
    }

    /// Resolve against a target size in pixels.
    #[must_use]
    pub fn to_viewport(&self, target_width: f32, target_height: f32) -> Viewport {
        Viewport {
            x: self.x * target_width,
            y: self.y * target_height,
            width: self.width * target_width,
            height: self.height * target_height,
        }
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::FULL
    }
}

/// One eye of a stereo (XR) camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrView {
    pub view: Mat4,
    pub projection: Mat4,
    pub viewport: Viewport,
}

#[derive(Debug, Clone)]
pub struct Camera {
    /// Cameras render in ascending priority; ties break on insertion order.
    pub priority: i32,
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
    pub rect: Rect,
    /// Which buffers this camera clears on its first use of a target.
    pub clear_flags: ClearFlags,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,
    /// `None` renders to the default surface.
    pub render_target: Option<TargetHandle>,
    /// Forces every draw under this camera into a specific shader pass
    /// (depth prepass cameras, picker cameras).
    pub shader_pass_override: Option<ShaderPass>,
    /// Mirrored rendering inverts winding for every draw.
    pub flip_faces: bool,
    /// When `false`, all draws render with culling disabled.
    pub cull_faces: bool,
    /// Non-empty for stereo rendering; each view draws with its own
    /// view/projection and viewport.
    pub xr_views: SmallVec<[XrView; 2]>,
    /// Layer ids this camera renders, in composition order.
    pub layer_ids: Vec<u32>,
    /// Postprocessing triggers after this layer instead of the camera's last.
    pub disable_postprocess_layer: Option<u32>,
    pub post_effects_enabled: bool,
    pub enabled: bool,
}

impl Camera {
    #[must_use]
    pub fn new() -> Self {
        Self {
            priority: 0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
            rect: Rect::FULL,
            clear_flags: ClearFlags::COLOR | ClearFlags::DEPTH,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            clear_stencil: 0,
            render_target: None,
            shader_pass_override: None,
            flip_faces: false,
            cull_faces: true,
            xr_views: SmallVec::new(),
            layer_ids: Vec::new(),
            disable_postprocess_layer: None,
            post_effects_enabled: true,
            enabled: true,
        }
    }

    /// World-space forward axis, used for depth sorting.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        // view transforms world to camera space; camera looks down -Z
        let inv = self.view.inverse();
        -Vec3::new(inv.z_axis.x, inv.z_axis.y, inv.z_axis.z)
    }

    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
