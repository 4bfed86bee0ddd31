//! Frame-graph execution.
//!
//! Each color pass runs in two phases. Preparation resolves shader variants
//! and transition flags for every action in the pass while the device is
//! free for pipeline creation; dispatch then opens the tracked encoder,
//! binds the target once, and submits every action's draws through it.

use crate::device::{
    ClearFlags, ClearOps, GraphicsDevice, TargetHandle, TrackedEncoder, UniformValue, Viewport,
};
use crate::errors::Result;
use crate::graph::builder::FrameGraph;
use crate::graph::pass::{FrameHooks, PassKind, RenderPass};
use crate::renderer::{
    FrameStats, LightUniformBank, PreparedDraw, RendererSettings, dispatch_ambient,
    dispatch_draws, prepare_draws, set_view_uniforms,
};
use crate::scene::{
    Camera, CameraKey, DrawCallKey, LayerComposition, LightKey, LightKind, Scene,
    ShadowRenderData, SortedLights, sort_draw_calls,
};
use crate::shader::{ProcessingOptions, ShaderPass, ShaderVariantCache};

/// Everything one frame's execution borrows.
pub struct FrameContext<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub scene: &'a mut Scene,
    pub composition: &'a LayerComposition,
    pub shader_cache: &'a mut ShaderVariantCache,
    pub settings: &'a RendererSettings,
    pub stats: &'a mut FrameStats,
    pub light_bank: &'a mut LightUniformBank,
    pub hooks: &'a mut dyn FrameHooks,
    /// View-level layout identity folded into pipeline processing keys.
    pub processing: ProcessingOptions,
    /// Target receiving cookie blits under clustered lighting.
    pub cookie_atlas: Option<TargetHandle>,
}

struct PreparedAction {
    camera_key: CameraKey,
    camera: Camera,
    prepared: Vec<PreparedDraw>,
    sorted_lights: SortedLights,
    first_camera_use: bool,
    last_camera_use: bool,
}

impl FrameGraph {
    /// Execute the built graph. Statistics reset at entry and reflect this
    /// frame on return.
    pub fn execute(&self, ctx: &mut FrameContext<'_>) -> Result<()> {
        ctx.stats.reset();
        for pass in &self.passes {
            ctx.stats.passes += 1;
            log::trace!("pass '{}'", pass.name);
            match &pass.kind {
                PassKind::Color { actions } => execute_color(ctx, pass, actions.clone())?,
                PassKind::LocalShadows { lights } => {
                    execute_local_shadows(ctx, lights)?;
                    if ctx.scene.clustered_lighting {
                        ctx.hooks.update_clusters();
                    }
                }
                PassKind::DirectionalShadow { light, camera } => {
                    execute_directional_shadow(ctx, *light, *camera)?;
                }
                PassKind::Cookies { lights } => execute_cookies(ctx, lights),
                PassKind::Grab { kind, target } => {
                    ctx.device.resolve_grab(*kind, *target);
                }
                PassKind::PostProcess { camera } => ctx.hooks.postprocess(*camera),
            }
        }
        Ok(())
    }
}

fn execute_color(
    ctx: &mut FrameContext<'_>,
    pass: &RenderPass,
    actions: std::ops::Range<usize>,
) -> Result<()> {
    let composition = ctx.composition;
    let clustered = ctx.scene.clustered_lighting;
    let mut records: Vec<PreparedAction> = Vec::new();

    for idx in actions {
        let action = &composition.render_actions()[idx];
        if !action.enabled {
            continue;
        }
        let Some(layer) = composition.layer(action.layer) else {
            continue;
        };
        let Some(camera) = ctx.scene.cameras.get(action.camera).cloned() else {
            log::warn!("camera for layer '{}' no longer exists, skipping action", layer.name);
            continue;
        };

        let sub = layer.sub_layer(action.transparent);
        let mut list = sub.draw_calls.clone();
        sort_draw_calls(&mut list, sub.sort_mode, &camera, &ctx.scene.draw_calls);

        let light_hash = layer.light_hash(&ctx.scene.lights, clustered);
        let sorted_lights = layer.sorted_lights(&ctx.scene.lights);
        let shader_pass = camera.shader_pass_override.unwrap_or(ShaderPass::Forward);

        let prepared = prepare_draws(
            ctx.device,
            ctx.shader_cache,
            ctx.scene,
            &list,
            shader_pass,
            light_hash,
            &ctx.processing,
            ctx.stats,
        )?;

        records.push(PreparedAction {
            camera_key: action.camera,
            camera,
            prepared,
            sorted_lights,
            first_camera_use: action.first_camera_use,
            last_camera_use: action.last_camera_use,
        });
    }

    let (width, height) = ctx.device.target_size(pass.target);
    let ambient = ctx.scene.ambient;

    let mut encoder = TrackedEncoder::new(&mut *ctx.device, &mut *ctx.stats);
    encoder.begin_target(pass.target, pass.clear.as_ref());

    for rec in &records {
        if rec.first_camera_use {
            ctx.hooks.camera_pre_render(rec.camera_key);
        }

        encoder.set_viewport(rec.camera.rect.to_viewport(width as f32, height as f32));
        set_view_uniforms(
            &mut encoder,
            rec.camera.view,
            rec.camera.projection,
            rec.camera.position,
        );
        dispatch_ambient(&mut encoder, ambient);

        dispatch_draws(
            &mut encoder,
            ctx.scene,
            &rec.prepared,
            rec.camera_key,
            &rec.camera,
            false,
            &rec.sorted_lights,
            ctx.light_bank,
            ctx.settings,
        );

        if rec.last_camera_use {
            ctx.hooks.camera_post_render(rec.camera_key);
        }
    }
    Ok(())
}

/// Shadow casters for every layer holding this light, in composition order.
fn shadow_casters(composition: &LayerComposition, light: LightKey) -> Vec<DrawCallKey> {
    let mut out = Vec::new();
    for layer in composition.layers().values() {
        if !layer.lights.contains(&light) {
            continue;
        }
        for &caster in &layer.shadow_casters {
            if !out.contains(&caster) {
                out.push(caster);
            }
        }
    }
    out
}

fn render_shadow_map(
    ctx: &mut FrameContext<'_>,
    light: LightKey,
    camera_key: CameraKey,
    data: ShadowRenderData,
    shader_pass: ShaderPass,
) -> Result<()> {
    let casters = shadow_casters(ctx.composition, light);
    let prepared = prepare_draws(
        ctx.device,
        ctx.shader_cache,
        ctx.scene,
        &casters,
        shader_pass,
        0,
        &ctx.processing,
        ctx.stats,
    )?;

    let (width, height) = ctx.device.target_size(Some(data.target));
    let clear = ClearOps {
        flags: ClearFlags::DEPTH,
        depth: 1.0,
        ..ClearOps::default()
    };
    // shadow passes have no scene camera; cull and flip resolve against a
    // neutral one
    let camera = Camera::new();

    let mut encoder = TrackedEncoder::new(&mut *ctx.device, &mut *ctx.stats);
    encoder.begin_target(Some(data.target), Some(&clear));
    encoder.set_viewport(Viewport {
        x: 0.0,
        y: 0.0,
        width: width as f32,
        height: height as f32,
    });
    encoder.set_uniform("matrix_viewProjection", UniformValue::from(data.shadow_matrix));

    dispatch_draws(
        &mut encoder,
        ctx.scene,
        &prepared,
        camera_key,
        &camera,
        false,
        &SortedLights::default(),
        ctx.light_bank,
        ctx.settings,
    );
    Ok(())
}

fn execute_local_shadows(ctx: &mut FrameContext<'_>, lights: &[LightKey]) -> Result<()> {
    for &key in lights {
        let Some(light) = ctx.scene.lights.get(key) else {
            continue;
        };
        let Some(data) = light.local_render_data else {
            log::trace!("shadow light has no render data allocated, skipping");
            continue;
        };
        let shader_pass = match light.kind {
            LightKind::Omni { .. } => ShaderPass::ShadowOmni,
            LightKind::Spot { .. } => ShaderPass::ShadowSpot,
            LightKind::Directional => continue,
        };
        render_shadow_map(ctx, key, CameraKey::default(), data, shader_pass)?;
    }
    Ok(())
}

fn execute_directional_shadow(
    ctx: &mut FrameContext<'_>,
    light: LightKey,
    camera: CameraKey,
) -> Result<()> {
    let Some(data) = ctx
        .scene
        .lights
        .get(light)
        .and_then(|l| l.directional_render_data.get(&camera).copied())
    else {
        log::trace!("directional light has no render data for camera, skipping");
        return Ok(());
    };
    render_shadow_map(ctx, light, camera, data, ShaderPass::ShadowDirectional)
}

/// Blit cookie textures into a fixed 4-column grid of quarter-size atlas
/// slots.
fn execute_cookies(ctx: &mut FrameContext<'_>, lights: &[LightKey]) {
    let (width, height) = ctx.device.target_size(ctx.cookie_atlas);
    let slot_w = width as f32 / 4.0;
    let slot_h = height as f32 / 4.0;

    let mut slot = 0usize;
    for &key in lights {
        let Some(cookie) = ctx.scene.lights.get(key).and_then(|l| l.cookie) else {
            continue;
        };
        let viewport = Viewport {
            x: (slot % 4) as f32 * slot_w,
            y: (slot / 4) as f32 * slot_h,
            width: slot_w,
            height: slot_h,
        };
        ctx.device.blit_texture(cookie, ctx.cookie_atlas, viewport);
        slot += 1;
    }
}
