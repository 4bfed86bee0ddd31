//! Draw Preparation Tests
//!
//! Tests for:
//! - Material-transition flags over a sorted sub-list
//! - Forced splits when shared-material draws differ in draw flags
//! - Light-mask transition detection
//! - Dirty-material flushing and invisible-draw skipping

mod common;

use std::sync::Arc;

use aurora::RenderError;
use aurora::renderer::{FrameStats, prepare_draws};
use aurora::scene::{DrawCallKey, DrawFlags, MaterialKey, Scene};
use aurora::shader::{ProcessingOptions, ShaderPass, ShaderVariantCache};
use common::{CountingGenerator, FailingGenerator, RecordingDevice, TestMaterial, draw};

struct Fixture {
    device: RecordingDevice,
    cache: ShaderVariantCache,
    scene: Scene,
    stats: FrameStats,
}

impl Fixture {
    fn new() -> Self {
        let mut cache = ShaderVariantCache::new();
        let (generator, _) = CountingGenerator::new();
        cache.register_generator("test", Box::new(generator));
        Self {
            device: RecordingDevice::new(),
            cache,
            scene: Scene::new(),
            stats: FrameStats::default(),
        }
    }

    fn material(&mut self, name: &str) -> MaterialKey {
        self.scene
            .materials
            .insert(Box::new(TestMaterial::named(name)))
    }

    fn prepare(&mut self, list: &[DrawCallKey]) -> Vec<(bool, bool)> {
        let prepared = prepare_draws(
            &mut self.device,
            &mut self.cache,
            &mut self.scene,
            list,
            ShaderPass::Forward,
            0,
            &ProcessingOptions::default(),
            &mut self.stats,
        )
        .expect("preparation succeeds");
        prepared
            .iter()
            .map(|p| (p.new_material, p.light_mask_changed))
            .collect()
    }
}

// ============================================================================
// Material Transition Tests
// ============================================================================

#[test]
fn material_sequence_marks_every_transition() {
    let mut fx = Fixture::new();
    let a = fx.material("a");
    let b = fx.material("b");

    // A, A, B, A: returning to A is still a transition
    let list: Vec<DrawCallKey> = [a, a, b, a]
        .iter()
        .map(|&m| fx.scene.draw_calls.insert(draw(m)))
        .collect();

    let flags = fx.prepare(&list);
    let new_material: Vec<bool> = flags.iter().map(|f| f.0).collect();
    assert_eq!(
        new_material,
        [true, false, true, true],
        "expected transitions at first use, B, and the return to A"
    );
    assert_eq!(fx.stats.material_switches, 3);
}

#[test]
fn shared_material_with_different_flags_is_split() {
    let mut fx = Fixture::new();
    let a = fx.material("a");

    let plain = fx.scene.draw_calls.insert(draw(a));
    let skinned = {
        let mut d = draw(a);
        d.flags = DrawFlags::SKINNED;
        fx.scene.draw_calls.insert(d)
    };

    let prepared = prepare_draws(
        &mut fx.device,
        &mut fx.cache,
        &mut fx.scene,
        &[plain, skinned],
        ShaderPass::Forward,
        0,
        &ProcessingOptions::default(),
        &mut fx.stats,
    )
    .expect("preparation succeeds");

    assert!(
        prepared[1].new_material,
        "flag change on a shared material must force a split"
    );
    assert!(
        !Arc::ptr_eq(&prepared[0].shader, &prepared[1].shader),
        "skinned and plain draws need distinct variants"
    );
}

#[test]
fn same_material_same_flags_reuses_the_bind() {
    let mut fx = Fixture::new();
    let a = fx.material("a");
    let list: Vec<DrawCallKey> = (0..3).map(|_| fx.scene.draw_calls.insert(draw(a))).collect();

    let flags = fx.prepare(&list);
    assert_eq!(
        flags.iter().filter(|f| f.0).count(),
        1,
        "only the first draw of a run binds the material"
    );
}

// ============================================================================
// Light Mask Tests
// ============================================================================

#[test]
fn light_mask_transitions_without_material_change() {
    let mut fx = Fixture::new();
    let a = fx.material("a");

    let list: Vec<DrawCallKey> = [1u32, 1, 2, 2]
        .iter()
        .map(|&mask| {
            let mut d = draw(a);
            d.light_mask = mask;
            fx.scene.draw_calls.insert(d)
        })
        .collect();

    let flags = fx.prepare(&list);
    let mask_changed: Vec<bool> = flags.iter().map(|f| f.1).collect();
    assert_eq!(
        mask_changed,
        [true, false, true, false],
        "light dispatch must re-run exactly at mask boundaries"
    );
}

#[test]
fn material_change_implies_light_redispatch() {
    let mut fx = Fixture::new();
    let a = fx.material("a");
    let b = fx.material("b");
    let list: Vec<DrawCallKey> = [a, b]
        .iter()
        .map(|&m| fx.scene.draw_calls.insert(draw(m)))
        .collect();

    let flags = fx.prepare(&list);
    assert!(flags[1].0 && flags[1].1);
}

// ============================================================================
// Housekeeping Tests
// ============================================================================

#[test]
fn generation_failure_aborts_preparation() {
    let mut fx = Fixture::new();
    fx.cache
        .register_generator("test", Box::new(FailingGenerator));
    let a = fx.material("a");
    let broken = fx.scene.draw_calls.insert(draw(a));

    let result = prepare_draws(
        &mut fx.device,
        &mut fx.cache,
        &mut fx.scene,
        &[broken],
        ShaderPass::Forward,
        0,
        &ProcessingOptions::default(),
        &mut fx.stats,
    );
    assert!(
        matches!(result, Err(RenderError::ShaderGeneration { .. })),
        "a generator rejecting its options must abort the whole pass"
    );
}

#[test]
fn invisible_draws_are_dropped() {
    let mut fx = Fixture::new();
    let a = fx.material("a");
    let visible = fx.scene.draw_calls.insert(draw(a));
    let hidden = {
        let mut d = draw(a);
        d.visible = false;
        fx.scene.draw_calls.insert(d)
    };

    let flags = fx.prepare(&[hidden, visible, hidden]);
    assert_eq!(flags.len(), 1, "invisible draws must not be prepared");
}

#[test]
fn dirty_materials_are_flushed_before_use() {
    let mut fx = Fixture::new();
    let key = fx.scene.materials.insert(Box::new(TestMaterial {
        dirty: true,
        ..TestMaterial::named("dirty")
    }));
    let d1 = fx.scene.draw_calls.insert(draw(key));
    let d2 = fx.scene.draw_calls.insert(draw(key));

    fx.prepare(&[d1, d2]);

    let material = &fx.scene.materials[key];
    assert!(!material.is_dirty(), "preparation must flush dirty materials");
}
