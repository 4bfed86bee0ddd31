//! Light uniform dispatch.
//!
//! Forward shading addresses lights through numbered uniform slots
//! (`light0_color`, `light1_position`…). Slot names are formatted once and
//! cached here, since dispatch runs for every light-state change of every
//! color pass.

use glam::Vec3;

use crate::device::{TrackedEncoder, UniformValue};
use crate::scene::{CameraKey, Light, LightKind, Scene};

/// Formatted uniform names for one light slot.
struct SlotNames {
    color: String,
    position: String,
    direction: String,
    range: String,
    inner_cone: String,
    outer_cone: String,
    shadow_matrix: String,
    shadow_map: String,
    shadow_params: String,
    cookie: String,
    cookie_intensity: String,
}

impl SlotNames {
    fn new(slot: usize) -> Self {
        Self {
            color: format!("light{slot}_color"),
            position: format!("light{slot}_position"),
            direction: format!("light{slot}_direction"),
            range: format!("light{slot}_range"),
            inner_cone: format!("light{slot}_innerConeAngle"),
            outer_cone: format!("light{slot}_outerConeAngle"),
            shadow_matrix: format!("light{slot}_shadowMatrix"),
            shadow_map: format!("light{slot}_shadowMap"),
            shadow_params: format!("light{slot}_shadowParams"),
            cookie: format!("light{slot}_cookie"),
            cookie_intensity: format!("light{slot}_cookieIntensity"),
        }
    }
}

/// Grows lazily to the highest slot index used in a frame.
#[derive(Default)]
pub struct LightUniformBank {
    slots: Vec<SlotNames>,
}

impl LightUniformBank {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, index: usize) -> &SlotNames {
        while self.slots.len() <= index {
            self.slots.push(SlotNames::new(self.slots.len()));
        }
        &self.slots[index]
    }

    fn upload(
        &mut self,
        encoder: &mut TrackedEncoder<'_>,
        light: &Light,
        slot: usize,
        camera: CameraKey,
    ) {
        let names = self.slot(slot);
        encoder.set_uniform(&names.color, UniformValue::from(light.final_color()));

        match light.kind {
            LightKind::Directional => {
                encoder.set_uniform(&names.direction, UniformValue::from(light.direction));
            }
            LightKind::Omni { range } => {
                encoder.set_uniform(&names.position, UniformValue::from(light.position));
                encoder.set_uniform(&names.range, UniformValue::Float(range));
            }
            LightKind::Spot {
                range,
                inner_cone,
                outer_cone,
            } => {
                encoder.set_uniform(&names.position, UniformValue::from(light.position));
                encoder.set_uniform(&names.direction, UniformValue::from(light.direction));
                encoder.set_uniform(&names.range, UniformValue::Float(range));
                encoder.set_uniform(&names.inner_cone, UniformValue::Float(inner_cone.cos()));
                encoder.set_uniform(&names.outer_cone, UniformValue::Float(outer_cone.cos()));
            }
        }

        if light.cast_shadows {
            if let Some(data) = light.render_data(camera) {
                let names = self.slot(slot);
                encoder.set_uniform(&names.shadow_matrix, UniformValue::from(data.shadow_matrix));
                encoder.set_uniform(&names.shadow_map, UniformValue::Texture(data.shadow_map));
                encoder.set_uniform(&names.shadow_params, UniformValue::Vec4(data.shadow_params));
            }
        }

        if let Some(cookie) = light.cookie {
            let names = self.slot(slot);
            encoder.set_uniform(&names.cookie, UniformValue::Texture(cookie));
            encoder.set_uniform(
                &names.cookie_intensity,
                UniformValue::Float(light.cookie_intensity),
            );
        }

        encoder.stats().light_uploads += 1;
    }

    /// Upload directional lights matching the draw's mask into slots starting
    /// at 0. Returns the number of slots used.
    pub fn dispatch_directional(
        &mut self,
        encoder: &mut TrackedEncoder<'_>,
        scene: &Scene,
        directional: &[crate::scene::LightKey],
        mask: u32,
        camera: CameraKey,
    ) -> usize {
        let mut used = 0;
        for &key in directional {
            let Some(light) = scene.lights.get(key) else {
                continue;
            };
            if light.mask & mask == 0 {
                continue;
            }
            self.upload(encoder, light, used, camera);
            used += 1;
        }
        used
    }

    /// Upload masked omni and spot lights into slots after the directional
    /// ones, up to `max_local`. Returns the total slot count.
    pub fn dispatch_local(
        &mut self,
        encoder: &mut TrackedEncoder<'_>,
        scene: &Scene,
        local: impl Iterator<Item = crate::scene::LightKey>,
        mask: u32,
        camera: CameraKey,
        first_slot: usize,
        max_local: usize,
    ) -> usize {
        let mut slot = first_slot;
        for key in local {
            if slot - first_slot >= max_local {
                break;
            }
            let Some(light) = scene.lights.get(key) else {
                continue;
            };
            if light.mask & mask == 0 {
                continue;
            }
            self.upload(encoder, light, slot, camera);
            slot += 1;
        }
        slot
    }
}

/// Scene-level ambient term, uploaded once per color pass.
pub fn dispatch_ambient(encoder: &mut TrackedEncoder<'_>, ambient: Vec3) {
    encoder.set_uniform("light_globalAmbient", UniformValue::from(ambient));
}
