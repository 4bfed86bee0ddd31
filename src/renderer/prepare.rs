//! Draw-call preparation.
//!
//! A single linear pass over a sorted sub-list resolves each draw's shader
//! variant through the cache and annotates the transitions the dispatcher
//! acts on: whether the draw starts a new material and whether its light
//! state differs from the previous draw's. Doing this up front keeps the
//! dispatch loop free of cache lookups and key folding.

use std::sync::Arc;

use crate::device::GraphicsDevice;
use crate::errors::Result;
use crate::renderer::FrameStats;
use crate::scene::{DrawCallKey, DrawFlags, MaterialKey, Scene};
use crate::shader::{
    CompiledShader, GenerationOptions, ProcessingOptions, ShaderPass, ShaderVariantCache,
};

/// One draw call with its resolved variant and transition flags.
pub struct PreparedDraw {
    pub draw_call: DrawCallKey,
    pub shader: Arc<CompiledShader>,
    /// This draw binds a different pipeline/material state than the previous
    /// one. Set for the first draw and whenever the material key or the
    /// variant-relevant draw flags change; two draws sharing a material but
    /// differing in flags are deliberately split.
    pub new_material: bool,
    /// Light uniforms must be re-dispatched before this draw. Implied by
    /// `new_material`, and also set on a light-mask transition alone.
    pub light_mask_changed: bool,
}

/// Prepare a sorted sub-list of draw calls for one pass.
///
/// Dirty materials are flushed before their first use. Draws whose material
/// is missing are skipped with an error log. Generation errors abort
/// preparation: an unregistered generator or a malformed option combination
/// means the scene is misconfigured, not degenerate. Compile failures are the
/// non-fatal case and surface later, at dispatch, through the variant's
/// sticky failure flag.
pub fn prepare_draws(
    device: &mut dyn GraphicsDevice,
    cache: &mut ShaderVariantCache,
    scene: &mut Scene,
    list: &[DrawCallKey],
    pass: ShaderPass,
    light_hash: u64,
    processing: &ProcessingOptions,
    stats: &mut FrameStats,
) -> Result<Vec<PreparedDraw>> {
    let mut prepared = Vec::with_capacity(list.len());
    let scene_key = scene.shader_key();

    let mut prev_material: Option<MaterialKey> = None;
    let mut prev_flags = DrawFlags::empty();
    let mut prev_mask: Option<u32> = None;

    for &key in list {
        let Some(draw) = scene.draw_calls.get(key) else {
            continue;
        };
        if !draw.visible {
            continue;
        }
        let material_key = draw.material;
        let flags = draw.flags;
        let light_mask = draw.light_mask;
        let vertex_format = draw.mesh.vertex_format;

        let Some(material) = scene.materials.get_mut(material_key) else {
            log::error!("draw call references a removed material, skipping");
            continue;
        };
        if material.is_dirty() {
            material.update();
        }

        let options = GenerationOptions {
            pass,
            defines: material.defines(pass),
            light_hash,
            draw_flags: flags,
            scene_key,
        };
        let processing = ProcessingOptions {
            vertex_format,
            ..*processing
        };

        let shader = cache.get_program(device, material.generator(), &options, &processing)?;

        let new_material = prev_material != Some(material_key) || prev_flags != flags;
        let light_mask_changed = new_material || prev_mask != Some(light_mask);
        if new_material {
            stats.material_switches += 1;
        }

        prepared.push(PreparedDraw {
            draw_call: key,
            shader,
            new_material,
            light_mask_changed,
        });

        prev_material = Some(material_key);
        prev_flags = flags;
        prev_mask = Some(light_mask);
    }

    Ok(prepared)
}
