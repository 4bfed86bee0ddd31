//! Layer composition and render actions.
//!
//! A composition is an ordered list of sub-layers (layer + opaque/transparent
//! half). Each frame it is flattened into a list of [`RenderAction`]s: one
//! per (camera, sub-layer) pair, cameras in priority order, sub-layers in
//! composition order within each camera. The flat action list is the sole
//! input the frame-graph builder consumes.

use rustc_hash::FxHashSet;
use slotmap::SlotMap;

use crate::device::{ClearFlags, GrabKind, TargetHandle};
use crate::scene::camera::{Camera, CameraKey};
use crate::scene::layer::{Layer, LayerKey};
use crate::scene::light::{Light, LightKey};

/// One camera rendering one sub-layer into one target.
#[derive(Debug, Clone)]
pub struct RenderAction {
    pub layer: LayerKey,
    pub transparent: bool,
    pub camera: CameraKey,
    pub render_target: Option<TargetHandle>,
    /// Which buffers to clear if this action opens a render pass.
    pub clear_flags: ClearFlags,
    /// First enabled action of this camera in the frame.
    pub first_camera_use: bool,
    /// Last enabled action of this camera in the frame.
    pub last_camera_use: bool,
    /// Camera postprocessing runs after this action.
    pub trigger_postprocess: bool,
    /// Directional shadow maps for this camera must be rendered before this
    /// action's pass begins.
    pub needs_dir_shadows: bool,
    pub grab: Option<GrabKind>,
    pub enabled: bool,
}

#[derive(Default)]
pub struct LayerComposition {
    layers: SlotMap<LayerKey, Layer>,
    /// Composition order: (layer, transparent-half) pairs.
    sub_layers: Vec<(LayerKey, bool)>,
    render_actions: Vec<RenderAction>,
}

impl LayerComposition {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer and append both its halves to the composition order,
    /// opaque first.
    pub fn push_layer(&mut self, layer: Layer) -> LayerKey {
        let key = self.layers.insert(layer);
        self.sub_layers.push((key, false));
        self.sub_layers.push((key, true));
        key
    }

    /// Add a layer and append only one half, for split compositions such as
    /// opaque-world / skybox / transparent-world.
    pub fn push_sub_layer(&mut self, layer: Layer, transparent: bool) -> LayerKey {
        let key = self.layers.insert(layer);
        self.sub_layers.push((key, transparent));
        key
    }

    /// Append another half of an already inserted layer.
    pub fn append_sub_layer(&mut self, layer: LayerKey, transparent: bool) {
        self.sub_layers.push((layer, transparent));
    }

    #[must_use]
    pub fn layer(&self, key: LayerKey) -> Option<&Layer> {
        self.layers.get(key)
    }

    pub fn layer_mut(&mut self, key: LayerKey) -> Option<&mut Layer> {
        self.layers.get_mut(key)
    }

    #[must_use]
    pub fn layer_by_id(&self, id: u32) -> Option<LayerKey> {
        self.layers.iter().find(|(_, l)| l.id == id).map(|(k, _)| k)
    }

    #[must_use]
    pub fn layers(&self) -> &SlotMap<LayerKey, Layer> {
        &self.layers
    }

    #[must_use]
    pub fn render_actions(&self) -> &[RenderAction] {
        &self.render_actions
    }

    /// All enabled cameras referencing at least one composition layer, in
    /// ascending priority. The sort is stable so equal priorities keep
    /// storage order.
    fn cameras_in_order(&self, cameras: &SlotMap<CameraKey, Camera>) -> Vec<CameraKey> {
        let mut used: Vec<CameraKey> = cameras
            .iter()
            .filter(|(_, cam)| {
                cam.enabled
                    && cam
                        .layer_ids
                        .iter()
                        .any(|id| self.layer_by_id(*id).is_some())
            })
            .map(|(k, _)| k)
            .collect();
        used.sort_by_key(|&k| cameras[k].priority);
        used
    }

    /// Rebuild the flat render-action list.
    ///
    /// Also refreshes each layer's camera list, since light and shadow
    /// dispatch later walk cameras through the layer.
    pub fn build_render_actions(
        &mut self,
        cameras: &SlotMap<CameraKey, Camera>,
        lights: &SlotMap<LightKey, Light>,
    ) {
        self.render_actions.clear();
        let ordered_cameras = self.cameras_in_order(cameras);

        for layer in self.layers.values_mut() {
            layer.cameras.clear();
        }
        for &cam_key in &ordered_cameras {
            for &id in &cameras[cam_key].layer_ids {
                if let Some(layer_key) = self.layer_by_id(id) {
                    let layer = &mut self.layers[layer_key];
                    if !layer.cameras.contains(&cam_key) {
                        layer.cameras.push(cam_key);
                    }
                }
            }
        }

        // (camera, target) pairs that already received the camera's clear
        let mut cleared: FxHashSet<(CameraKey, Option<TargetHandle>)> = FxHashSet::default();

        for &cam_key in &ordered_cameras {
            let camera = &cameras[cam_key];
            let camera_start = self.render_actions.len();
            let needs_dir_shadows = self.camera_has_dir_shadow_lights(camera, lights);
            let mut camera_unused = true;

            for &(layer_key, transparent) in &self.sub_layers {
                let layer = &self.layers[layer_key];
                if !camera.layer_ids.contains(&layer.id) {
                    continue;
                }
                let enabled = layer.enabled && layer.sub_layer(transparent).enabled;
                let render_target = layer.render_target.or(camera.render_target);

                // camera-level metadata lands on enabled actions only, since
                // the frame graph never executes disabled ones
                let first_camera_use = enabled && camera_unused;
                if enabled {
                    camera_unused = false;
                }
                let mut clear_flags = layer.clear_flags;
                // a camera clears each target once, and only when it owns
                // the full rect
                if enabled
                    && camera.rect.is_full()
                    && cleared.insert((cam_key, render_target))
                {
                    clear_flags |= camera.clear_flags;
                }

                self.render_actions.push(RenderAction {
                    layer: layer_key,
                    transparent,
                    camera: cam_key,
                    render_target,
                    clear_flags,
                    first_camera_use,
                    last_camera_use: false,
                    trigger_postprocess: false,
                    needs_dir_shadows: first_camera_use && needs_dir_shadows,
                    grab: layer.grab,
                    enabled,
                });
            }

            let camera_end = self.render_actions.len();
            let last_enabled = (camera_start..camera_end)
                .rev()
                .find(|&i| self.render_actions[i].enabled);
            if let Some(last) = last_enabled {
                self.render_actions[last].last_camera_use = true;
                if camera.post_effects_enabled {
                    if let Some(trigger) =
                        self.postprocess_trigger(camera, camera_start, camera_end)
                    {
                        self.render_actions[trigger].trigger_postprocess = true;
                    }
                }
            }
        }

        log::trace!(
            "built {} render actions for {} cameras",
            self.render_actions.len(),
            ordered_cameras.len()
        );
    }

    /// Index of the action after which the camera's postprocessing runs: the
    /// last enabled action before the camera's post-effects-disabled layer,
    /// or the camera's last enabled action when no such layer is set.
    ///
    /// `None` when the excluded layer opens the camera, in which case nothing
    /// renders before it and postprocessing is suppressed for the frame.
    fn postprocess_trigger(&self, camera: &Camera, start: usize, end: usize) -> Option<usize> {
        if let Some(disable_id) = camera.disable_postprocess_layer {
            for i in start..end {
                let layer = &self.layers[self.render_actions[i].layer];
                if layer.id == disable_id {
                    return (start..i).rev().find(|&j| self.render_actions[j].enabled);
                }
            }
        }
        (start..end).rev().find(|&i| self.render_actions[i].enabled)
    }

    fn camera_has_dir_shadow_lights(
        &self,
        camera: &Camera,
        lights: &SlotMap<LightKey, Light>,
    ) -> bool {
        self.layers.values().any(|layer| {
            camera.layer_ids.contains(&layer.id)
                && layer.lights.iter().any(|&k| {
                    lights
                        .get(k)
                        .is_some_and(|l| l.kind.is_directional() && l.needs_shadow_pass())
                })
        })
    }

    /// Directional shadow-casting lights visible to a camera, in layer order.
    pub fn dir_shadow_lights(
        &self,
        camera: &Camera,
        lights: &SlotMap<LightKey, Light>,
    ) -> Vec<LightKey> {
        let mut out = Vec::new();
        for layer in self.layers.values() {
            if !camera.layer_ids.contains(&layer.id) {
                continue;
            }
            for &k in &layer.lights {
                if lights
                    .get(k)
                    .is_some_and(|l| l.kind.is_directional() && l.needs_shadow_pass())
                    && !out.contains(&k)
                {
                    out.push(k);
                }
            }
        }
        out
    }
}
