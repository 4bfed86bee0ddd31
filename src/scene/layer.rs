//! Render layers.
//!
//! A layer pairs an ordered set of draw calls with the lights that affect
//! them and the cameras that render them. Opaque and transparent draws live
//! in separate sub-lists because compositions may interleave them (render
//! world-opaque, then skybox, then world-transparent).

use slotmap::{Key, SlotMap};
use uuid::Uuid;
use xxhash_rust::xxh3::Xxh3;

use crate::device::{ClearFlags, GrabKind, TargetHandle};
use crate::scene::camera::{Camera, CameraKey};
use crate::scene::draw_call::{DrawCall, DrawCallKey};
use crate::scene::light::{Light, LightKey, LightKind, SortedLights};

slotmap::new_key_type! {
    pub struct LayerKey;
}

/// How a sub-list orders its draws before preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// Keep insertion order.
    None,
    /// Sort by each draw's explicit `draw_order`.
    Manual,
    /// Sort by material/mesh key to maximize state reuse.
    MaterialMesh,
    /// Camera-distance sort, far to near (transparent default).
    BackToFront,
    /// Camera-distance sort, near to far (opaque overdraw reduction).
    FrontToBack,
}

/// One of a layer's two draw sub-lists.
#[derive(Debug, Clone)]
pub struct SubLayer {
    pub draw_calls: Vec<DrawCallKey>,
    pub sort_mode: SortMode,
    pub enabled: bool,
}

impl SubLayer {
    fn new(sort_mode: SortMode) -> Self {
        Self {
            draw_calls: Vec::new(),
            sort_mode,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    /// Stable id referenced by camera layer lists.
    pub id: u32,
    pub name: String,
    pub opaque: SubLayer,
    pub transparent: SubLayer,
    /// Lights affecting this layer's draws.
    pub lights: Vec<LightKey>,
    /// Draw calls that cast into this layer's shadow passes.
    pub shadow_casters: Vec<DrawCallKey>,
    /// Cameras rendering this layer, priority-ordered by the composition.
    pub cameras: Vec<CameraKey>,
    /// Overrides every camera's target while rendering this layer.
    pub render_target: Option<TargetHandle>,
    /// Extra clears this layer forces even on non-first camera use.
    pub clear_flags: ClearFlags,
    /// When set, a grab of the scene so far is resolved before this layer
    /// renders, so its materials can sample it.
    pub grab: Option<GrabKind>,
    pub enabled: bool,
}

impl Layer {
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            opaque: SubLayer::new(SortMode::FrontToBack),
            transparent: SubLayer::new(SortMode::BackToFront),
            lights: Vec::new(),
            shadow_casters: Vec::new(),
            cameras: Vec::new(),
            render_target: None,
            clear_flags: ClearFlags::empty(),
            grab: None,
            enabled: true,
        }
    }

    pub fn sub_layer(&self, transparent: bool) -> &SubLayer {
        if transparent { &self.transparent } else { &self.opaque }
    }

    pub fn sub_layer_mut(&mut self, transparent: bool) -> &mut SubLayer {
        if transparent {
            &mut self.transparent
        } else {
            &mut self.opaque
        }
    }

    /// Split this layer's lights by kind. Buckets are ordered by light uuid
    /// so downstream uniform slots are deterministic.
    #[must_use]
    pub fn sorted_lights(&self, lights: &SlotMap<LightKey, Light>) -> SortedLights {
        let mut sorted = SortedLights::default();
        let mut keyed: Vec<(Uuid, LightKey)> = self
            .lights
            .iter()
            .copied()
            .filter(|&k| lights.get(k).is_some_and(|l| l.enabled))
            .map(|k| (lights[k].id(), k))
            .collect();
        keyed.sort_unstable_by_key(|&(id, _)| id);
        for (_, key) in keyed {
            match lights[key].kind {
                LightKind::Directional => sorted.directional.push(key),
                LightKind::Omni { .. } => sorted.omni.push(key),
                LightKind::Spot { .. } => sorted.spot.push(key),
            }
        }
        sorted
    }

    /// Hash of the layer's effective light set, folded into shader variant
    /// keys. Under clustered lighting only directional lights vary shaders,
    /// so local lights are excluded from the hash there.
    #[must_use]
    pub fn light_hash(&self, lights: &SlotMap<LightKey, Light>, clustered: bool) -> u64 {
        let mut ids: Vec<Uuid> = self
            .lights
            .iter()
            .copied()
            .filter_map(|k| lights.get(k))
            .filter(|l| l.enabled && (!clustered || l.kind.is_directional()))
            .map(Light::id)
            .collect();
        if ids.is_empty() {
            return 0;
        }
        ids.sort_unstable();
        let mut hasher = Xxh3::new();
        for id in ids {
            hasher.update(id.as_bytes());
        }
        hasher.digest()
    }
}

/// Order one sub-list in place for a camera.
pub fn sort_draw_calls(
    list: &mut [DrawCallKey],
    mode: SortMode,
    camera: &Camera,
    draw_calls: &SlotMap<DrawCallKey, DrawCall>,
) {
    match mode {
        SortMode::None => {}
        SortMode::Manual => {
            list.sort_by_key(|&k| draw_calls.get(k).map_or(0, |d| d.draw_order));
        }
        SortMode::MaterialMesh => {
            // material key as the tie-break keeps equal-key draws batched
            list.sort_by_key(|&k| {
                draw_calls
                    .get(k)
                    .map_or((0, 0), |d| (d.sort_key, d.material.data().as_ffi()))
            });
        }
        SortMode::BackToFront | SortMode::FrontToBack => {
            let forward = camera.forward();
            let origin = camera.position;
            let depth = |k: DrawCallKey| {
                draw_calls
                    .get(k)
                    .map_or(0.0, |d| forward.dot(d.center - origin))
            };
            if mode == SortMode::BackToFront {
                list.sort_by(|&a, &b| {
                    depth(b).partial_cmp(&depth(a)).unwrap_or(std::cmp::Ordering::Equal)
                });
            } else {
                list.sort_by(|&a, &b| {
                    depth(a).partial_cmp(&depth(b)).unwrap_or(std::cmp::Ordering::Equal)
                });
            }
        }
    }
}
