//! Frame-graph construction.
//!
//! The builder walks the composition's flat render-action list once and
//! groups contiguous enabled actions that share a render target into single
//! color passes ("runs"). A run closes when the target changes, when the
//! next action needs directional shadow maps rendered first, when a grab
//! must resolve, or at a postprocess trigger. Disabled actions neither join
//! nor close runs, so a disabled layer between two same-target layers still
//! leaves one merged pass.
//!
//! Building is pure: the same scene and composition always produce the same
//! pass list.

use slotmap::SlotMap;

use crate::device::ClearOps;
use crate::graph::pass::{PassKind, RenderPass};
use crate::scene::{Camera, LayerComposition, Light, LightKey, RenderAction, Scene};

/// The built pass list for one frame.
#[derive(Debug, Default)]
pub struct FrameGraph {
    pub passes: Vec<RenderPass>,
}

fn clear_ops(action: &RenderAction, camera: &Camera) -> Option<ClearOps> {
    if action.clear_flags.is_empty() {
        return None;
    }
    Some(ClearOps {
        flags: action.clear_flags,
        color: camera.clear_color,
        depth: camera.clear_depth,
        stencil: camera.clear_stencil,
    })
}

/// Omni/spot lights needing shadow passes, deduplicated across layers in
/// composition order.
fn local_shadow_lights(
    composition: &LayerComposition,
    lights: &SlotMap<LightKey, Light>,
) -> Vec<LightKey> {
    let mut out = Vec::new();
    for layer in composition.layers().values() {
        for &key in &layer.lights {
            if lights
                .get(key)
                .is_some_and(|l| !l.kind.is_directional() && l.needs_shadow_pass())
                && !out.contains(&key)
            {
                out.push(key);
            }
        }
    }
    out
}

fn cookie_lights(
    composition: &LayerComposition,
    lights: &SlotMap<LightKey, Light>,
) -> Vec<LightKey> {
    let mut out = Vec::new();
    for layer in composition.layers().values() {
        for &key in &layer.lights {
            if lights
                .get(key)
                .is_some_and(|l| l.enabled && !l.kind.is_directional() && l.cookie.is_some())
                && !out.contains(&key)
            {
                out.push(key);
            }
        }
    }
    out
}

struct Run {
    start: usize,
    /// Last enabled action included so far.
    last: usize,
}

/// Build the frame graph from an up-to-date composition.
#[must_use]
pub fn build_frame_graph(scene: &Scene, composition: &LayerComposition) -> FrameGraph {
    let mut passes = Vec::new();

    // Shadow and cookie work precedes all color rendering.
    let local = local_shadow_lights(composition, &scene.lights);
    if scene.clustered_lighting {
        let cookies = cookie_lights(composition, &scene.lights);
        if !cookies.is_empty() {
            passes.push(RenderPass {
                name: "cookie-atlas".into(),
                kind: PassKind::Cookies { lights: cookies },
                target: None,
                clear: None,
            });
        }
        // always present: cluster rebuild rides on this pass
        passes.push(RenderPass {
            name: "local-shadows".into(),
            kind: PassKind::LocalShadows { lights: local },
            target: None,
            clear: None,
        });
    } else {
        for key in local {
            passes.push(RenderPass {
                name: "local-shadow".into(),
                kind: PassKind::LocalShadows { lights: vec![key] },
                target: None,
                clear: None,
            });
        }
    }

    let actions = composition.render_actions();
    let mut run: Option<Run> = None;

    let close = |passes: &mut Vec<RenderPass>, run: &mut Option<Run>| {
        if let Some(r) = run.take() {
            let first = &actions[r.start];
            let clear = scene
                .cameras
                .get(first.camera)
                .and_then(|camera| clear_ops(first, camera));
            let layer_name = composition
                .layer(first.layer)
                .map_or("layer", |l| l.name.as_str());
            passes.push(RenderPass {
                name: format!(
                    "{layer_name}{}",
                    if first.transparent { "-transparent" } else { "" }
                ),
                kind: PassKind::Color {
                    actions: r.start..r.last + 1,
                },
                target: first.render_target,
                clear,
            });
        }
    };

    for (i, action) in actions.iter().enumerate() {
        if !action.enabled {
            continue;
        }

        if action.needs_dir_shadows {
            close(&mut passes, &mut run);
            if let Some(camera) = scene.cameras.get(action.camera) {
                for light in composition.dir_shadow_lights(camera, &scene.lights) {
                    passes.push(RenderPass {
                        name: "directional-shadow".into(),
                        kind: PassKind::DirectionalShadow {
                            light,
                            camera: action.camera,
                        },
                        target: None,
                        clear: None,
                    });
                }
            }
        }

        if let Some(kind) = action.grab {
            // the scene so far must be resolved before this layer samples it
            close(&mut passes, &mut run);
            passes.push(RenderPass {
                name: match kind {
                    crate::device::GrabKind::Color => "grab-color".into(),
                    crate::device::GrabKind::Depth => "grab-depth".into(),
                },
                kind: PassKind::Grab {
                    kind,
                    target: action.render_target,
                },
                target: action.render_target,
                clear: None,
            });
        }

        if run
            .as_ref()
            .is_some_and(|r| actions[r.start].render_target != action.render_target)
        {
            close(&mut passes, &mut run);
        }

        match &mut run {
            Some(r) => r.last = i,
            None => run = Some(Run { start: i, last: i }),
        }

        if action.trigger_postprocess {
            close(&mut passes, &mut run);
            passes.push(RenderPass {
                name: "postprocess".into(),
                kind: PassKind::PostProcess {
                    camera: action.camera,
                },
                target: action.render_target,
                clear: None,
            });
        }
    }
    close(&mut passes, &mut run);

    log::trace!("frame graph built with {} passes", passes.len());
    FrameGraph { passes }
}
