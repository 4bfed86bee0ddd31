//! Draw-call dispatch.
//!
//! Consumes the preparer's output and turns it into device calls. All
//! redundancy elimination driven by the transition flags happens here:
//! pipeline and render state bind only on `new_material`, light uniforms
//! re-dispatch only on `light_mask_changed`. A variant the backend rejects
//! is marked failed and its draws are skipped for the rest of the frame,
//! without aborting the pass.

use glam::Mat4;

use crate::device::{CullMode, TrackedEncoder, UniformValue};
use crate::renderer::lights::LightUniformBank;
use crate::renderer::prepare::PreparedDraw;
use crate::renderer::settings::RendererSettings;
use crate::scene::{Camera, CameraKey, Scene, SortedLights, XrView};

/// Upload the per-view transform uniforms.
pub fn set_view_uniforms(
    encoder: &mut TrackedEncoder<'_>,
    view: Mat4,
    projection: Mat4,
    position: glam::Vec3,
) {
    encoder.set_uniform("matrix_view", UniformValue::from(view));
    encoder.set_uniform("matrix_projection", UniformValue::from(projection));
    encoder.set_uniform("matrix_viewProjection", UniformValue::from(projection * view));
    encoder.set_uniform("view_position", UniformValue::from(position));
}

fn resolve_cull(base: CullMode, flip: bool, camera: &Camera) -> CullMode {
    if !camera.cull_faces {
        return CullMode::None;
    }
    if flip { base.flipped() } else { base }
}

/// Submit one prepared sub-list under one camera.
///
/// `flip_faces` flips winding for the whole pass, for callers rendering into
/// a target with inverted orientation. It folds with the per-draw and
/// per-camera flips, so two flips cancel.
pub fn dispatch_draws(
    encoder: &mut TrackedEncoder<'_>,
    scene: &Scene,
    prepared: &[PreparedDraw],
    camera_key: CameraKey,
    camera: &Camera,
    flip_faces: bool,
    sorted_lights: &SortedLights,
    light_bank: &mut LightUniformBank,
    settings: &RendererSettings,
) {
    let clustered = scene.clustered_lighting;
    let mut current_failed = false;

    for p in prepared {
        if let Some(cap) = settings.skip_render_after {
            if encoder.stats().draw_calls >= cap {
                encoder.stats().skipped_capped += 1;
                continue;
            }
        }

        let Some(draw) = scene.draw_calls.get(p.draw_call) else {
            continue;
        };
        let Some(material) = scene.materials.get(draw.material) else {
            continue;
        };

        if p.new_material {
            current_failed = p.shader.is_failed();
            if !current_failed && !encoder.bind_shader(&p.shader) {
                p.shader.mark_failed();
                log::error!("pipeline for shader '{}' failed to bind, skipping its draws", p.shader.label());
                current_failed = true;
            }
            if !current_failed {
                encoder.set_render_state(material.render_state());
                for (name, value) in material.parameters() {
                    encoder.set_uniform(name, value.clone());
                }
            }
        }
        if current_failed {
            encoder.stats().skipped_failed += 1;
            continue;
        }

        if p.light_mask_changed {
            let used = light_bank.dispatch_directional(
                encoder,
                scene,
                &sorted_lights.directional,
                draw.light_mask,
                camera_key,
            );
            // clustered lighting reaches local lights through the cluster
            // structures, not numbered slots
            if !clustered {
                light_bank.dispatch_local(
                    encoder,
                    scene,
                    sorted_lights.iter_local(),
                    draw.light_mask,
                    camera_key,
                    used,
                    settings.max_lights_per_draw,
                );
            }
        }

        encoder.set_cull_mode(resolve_cull(
            material.render_state().cull,
            flip_faces ^ draw.flip_faces ^ camera.flip_faces,
            camera,
        ));

        encoder.set_uniform("matrix_model", UniformValue::from(draw.world));
        if let Some(skin) = draw.skin {
            encoder.bind_skin(skin);
        }
        if let Some(morph) = draw.morph {
            encoder.bind_morph(morph);
        }
        for (name, value) in &draw.parameters {
            encoder.set_uniform(name, value.clone());
        }

        encoder.bind_vertex_buffers(&draw.mesh.vertex_buffers);
        encoder.bind_index_buffer(draw.mesh.index_buffer);

        let primitive = draw.mesh.primitive(draw.instances);
        if camera.xr_views.is_empty() {
            encoder.draw(primitive);
        } else {
            for XrView {
                view,
                projection,
                viewport,
            } in camera.xr_views.iter().copied()
            {
                encoder.set_viewport(viewport);
                set_view_uniforms(encoder, view, projection, camera.position);
                encoder.draw(primitive);
            }
        }

        // per-draw overrides must not leak into the next draw of the same
        // material bind
        if !draw.parameters.is_empty() {
            for (name, _) in &draw.parameters {
                if let Some((_, value)) = material
                    .parameters()
                    .iter()
                    .find(|(mat_name, _)| mat_name == name)
                {
                    encoder.set_uniform(name, value.clone());
                }
            }
        }
    }
}
