//! Scene content: draw calls, materials, lights, cameras, layers.

mod camera;
mod composition;
mod draw_call;
mod layer;
mod light;

pub use camera::{Camera, CameraKey, Rect, XrView};
pub use composition::{LayerComposition, RenderAction};
pub use draw_call::{DrawCall, DrawCallKey, DrawFlags, Material, MaterialKey, Mesh};
pub use layer::{Layer, LayerKey, SortMode, SubLayer, sort_draw_calls};
pub use light::{Light, LightKey, LightKind, ShadowConfig, ShadowRenderData, SortedLights};

use glam::Vec3;
use slotmap::SlotMap;
use xxhash_rust::xxh3::Xxh3;

/// Scene-wide fog, folded into every shader variant key.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Fog {
    #[default]
    None,
    Linear {
        start: f32,
        end: f32,
    },
    Exp {
        density: f32,
    },
    Exp2 {
        density: f32,
    },
}

impl Fog {
    fn key_bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Linear { .. } => 1,
            Self::Exp { .. } => 2,
            Self::Exp2 { .. } => 3,
        }
    }
}

/// Owning storage for everything the scheduler renders.
#[derive(Default)]
pub struct Scene {
    pub draw_calls: SlotMap<DrawCallKey, DrawCall>,
    pub materials: SlotMap<MaterialKey, Box<dyn Material>>,
    pub lights: SlotMap<LightKey, Light>,
    pub cameras: SlotMap<CameraKey, Camera>,
    pub ambient: Vec3,
    pub fog: Fog,
    pub fog_color: Vec3,
    /// Clustered lighting uploads local lights through cluster structures;
    /// shader variants then only depend on directional lights.
    pub clustered_lighting: bool,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene-wide state that shapes generated shader source. Anything hashed
    /// here forces re-generation when it changes, so it stays coarse: fog
    /// mode and the lighting path, not their parameter values.
    #[must_use]
    pub fn shader_key(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(&[self.fog.key_bits(), u8::from(self.clustered_lighting)]);
        hasher.digest()
    }
}
