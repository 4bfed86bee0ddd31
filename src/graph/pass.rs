//! Frame-graph pass descriptions.

use std::ops::Range;

use crate::device::{ClearOps, GrabKind, TargetHandle};
use crate::scene::{CameraKey, LightKey};

/// What a pass does when executed.
#[derive(Debug, Clone, PartialEq)]
pub enum PassKind {
    /// Shadow maps for omni and spot lights. Non-clustered frames build one
    /// of these per casting light; clustered frames share a single pass.
    LocalShadows { lights: Vec<LightKey> },
    /// Cookie textures copied into the cookie atlas (clustered only).
    Cookies { lights: Vec<LightKey> },
    /// Shadow map for one directional light as seen by one camera, rendered
    /// before that camera's first color pass.
    DirectionalShadow { light: LightKey, camera: CameraKey },
    /// A run of contiguous render actions sharing one render target.
    /// Indices refer to the composition's flat action list; disabled actions
    /// inside the range are skipped at execution.
    Color { actions: Range<usize> },
    /// Capture of the scene rendered so far, for grab-sampling materials.
    Grab {
        kind: GrabKind,
        target: Option<TargetHandle>,
    },
    /// Camera postprocessing hook point.
    PostProcess { camera: CameraKey },
}

/// One node of the built frame graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    pub name: String,
    pub kind: PassKind,
    pub target: Option<TargetHandle>,
    /// Clear issued when the pass opens its target. Derived from the run's
    /// first action; later actions in the run never clear.
    pub clear: Option<ClearOps>,
}

/// Frame lifecycle callbacks invoked by the executor.
///
/// All methods default to no-ops so callers implement only what they need.
pub trait FrameHooks {
    /// Before a camera's first action renders.
    fn camera_pre_render(&mut self, _camera: CameraKey) {}

    /// After a camera's last action rendered.
    fn camera_post_render(&mut self, _camera: CameraKey) {}

    /// A postprocess pass for the camera is reached.
    fn postprocess(&mut self, _camera: CameraKey) {}

    /// Light cluster structures should be rebuilt (after the shared local
    /// shadow pass of a clustered frame).
    fn update_clusters(&mut self) {}
}

/// The no-op hook set.
pub struct NoHooks;

impl FrameHooks for NoHooks {}
