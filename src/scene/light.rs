//! Lights and their shadow bookkeeping.
//!
//! Light identity is a stable `Uuid` rather than a slotmap key so that light
//! hashes are a pure function of which lights a layer holds, independent of
//! storage order or key reuse.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::device::{TargetHandle, TextureHandle};
use crate::scene::camera::CameraKey;

slotmap::new_key_type! {
    pub struct LightKey;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Omni {
        range: f32,
    },
    Spot {
        range: f32,
        inner_cone: f32,
        outer_cone: f32,
    },
}

impl LightKind {
    #[must_use]
    pub fn is_directional(&self) -> bool {
        matches!(self, Self::Directional)
    }
}

/// Static shadow configuration for a casting light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowConfig {
    pub resolution: u32,
    pub bias: f32,
    pub normal_bias: f32,
    /// Directional lights only: how far from the camera shadows extend.
    pub distance: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: 1024,
            bias: 0.05,
            normal_bias: 0.0,
            distance: 40.0,
        }
    }
}

/// Per-frame shadow resources produced by a shadow pass and consumed by the
/// light uniform dispatch of subsequent color passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowRenderData {
    pub shadow_matrix: Mat4,
    pub shadow_map: TextureHandle,
    pub target: TargetHandle,
    /// `[resolution, normal_bias, bias, 1/resolution]`, uploaded as one vec4.
    pub shadow_params: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct Light {
    id: Uuid,
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub direction: Vec3,
    /// Matched against draw-call light masks at dispatch.
    pub mask: u32,
    pub enabled: bool,
    pub cast_shadows: bool,
    pub shadow: ShadowConfig,
    pub cookie: Option<TextureHandle>,
    pub cookie_intensity: f32,
    /// Shadow resources for omni/spot lights (camera independent).
    pub local_render_data: Option<ShadowRenderData>,
    /// Shadow resources for directional lights, per rendering camera.
    pub directional_render_data: FxHashMap<CameraKey, ShadowRenderData>,
}

impl Light {
    #[must_use]
    pub fn new(kind: LightKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            color: Vec3::ONE,
            intensity: 1.0,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            mask: u32::MAX,
            enabled: true,
            cast_shadows: false,
            shadow: ShadowConfig::default(),
            cookie: None,
            cookie_intensity: 1.0,
            local_render_data: None,
            directional_render_data: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Final color scaled by intensity, as uploaded to shaders.
    #[must_use]
    pub fn final_color(&self) -> Vec3 {
        self.color * self.intensity
    }

    #[must_use]
    pub fn needs_shadow_pass(&self) -> bool {
        self.enabled && self.cast_shadows
    }

    /// Shadow data relevant to a draw from the given camera, if rendered.
    #[must_use]
    pub fn render_data(&self, camera: CameraKey) -> Option<&ShadowRenderData> {
        match self.kind {
            LightKind::Directional => self.directional_render_data.get(&camera),
            _ => self.local_render_data.as_ref(),
        }
    }
}

/// Layer lights split by kind, in stable uuid order within each bucket.
#[derive(Debug, Clone, Default)]
pub struct SortedLights {
    pub directional: Vec<LightKey>,
    pub omni: Vec<LightKey>,
    pub spot: Vec<LightKey>,
}

impl SortedLights {
    pub fn iter_local(&self) -> impl Iterator<Item = LightKey> + '_ {
        self.omni.iter().chain(self.spot.iter()).copied()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.directional.len() + self.omni.len() + self.spot.len()
    }
}
