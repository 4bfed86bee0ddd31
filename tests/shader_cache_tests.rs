//! Shader Variant Cache Tests
//!
//! Tests for:
//! - Key-equal requests returning the same compiled variant (pointer equal)
//! - Definition reuse across processing variants
//! - Removal isolation between variants
//! - Generator invalidation and full clears
//! - Unknown generator rejection

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use aurora::RenderError;
use aurora::shader::{ProcessingOptions, ShaderDefines, ShaderVariantCache};
use common::{Call, CountingGenerator, RecordingDevice, forward_options};

fn cache_with_generator() -> (ShaderVariantCache, Arc<std::sync::atomic::AtomicUsize>) {
    let mut cache = ShaderVariantCache::new();
    let (generator, counter) = CountingGenerator::new();
    cache.register_generator("test", Box::new(generator));
    (cache, counter)
}

// ============================================================================
// get_program Tests
// ============================================================================

#[test]
fn equal_keys_return_pointer_equal_variants() {
    let mut device = RecordingDevice::new();
    let (mut cache, _) = cache_with_generator();
    let options = forward_options(ShaderDefines::new());
    let processing = ProcessingOptions::default();

    let a = cache
        .get_program(&mut device, "test", &options, &processing)
        .expect("first resolve");
    let b = cache
        .get_program(&mut device, "test", &options, &processing)
        .expect("second resolve");

    assert!(
        Arc::ptr_eq(&a, &b),
        "key-equal requests must share one compiled variant"
    );
    assert_eq!(cache.variant_count(), 1);
}

#[test]
fn generation_runs_once_per_key() {
    let mut device = RecordingDevice::new();
    let (mut cache, counter) = cache_with_generator();
    let options = forward_options(ShaderDefines::new());
    let processing = ProcessingOptions::default();

    for _ in 0..5 {
        cache
            .get_program(&mut device, "test", &options, &processing)
            .expect("resolve");
    }
    assert_eq!(
        counter.load(Ordering::Relaxed),
        1,
        "repeated key-equal requests must not re-generate source"
    );
    assert_eq!(
        device.count(|c| matches!(c, Call::CreatePipeline(_))),
        1,
        "repeated key-equal requests must not re-compile"
    );
}

#[test]
fn processing_variants_share_one_definition() {
    let mut device = RecordingDevice::new();
    let (mut cache, counter) = cache_with_generator();
    let options = forward_options(ShaderDefines::new());

    let a = cache
        .get_program(&mut device, "test", &options, &ProcessingOptions::default())
        .expect("variant a");
    let b = cache
        .get_program(
            &mut device,
            "test",
            &options,
            &ProcessingOptions {
                vertex_format: 99,
                ..ProcessingOptions::default()
            },
        )
        .expect("variant b");

    assert!(
        !Arc::ptr_eq(&a, &b),
        "different processing must compile distinct pipelines"
    );
    assert_eq!(
        counter.load(Ordering::Relaxed),
        1,
        "processing variants share one generated definition"
    );
    assert_eq!(cache.definition_count(), 1);
    assert_eq!(cache.variant_count(), 2);
}

#[test]
fn distinct_defines_generate_distinct_definitions() {
    let mut device = RecordingDevice::new();
    let (mut cache, counter) = cache_with_generator();
    let processing = ProcessingOptions::default();

    let mut fog = ShaderDefines::new();
    fog.set("FOG", "linear");

    cache
        .get_program(
            &mut device,
            "test",
            &forward_options(ShaderDefines::new()),
            &processing,
        )
        .expect("plain");
    cache
        .get_program(&mut device, "test", &forward_options(fog), &processing)
        .expect("fogged");

    assert_eq!(counter.load(Ordering::Relaxed), 2);
    assert_eq!(cache.variant_count(), 2);
}

#[test]
fn unknown_generator_is_an_error() {
    let mut device = RecordingDevice::new();
    let mut cache = ShaderVariantCache::new();

    let err = cache
        .get_program(
            &mut device,
            "missing",
            &forward_options(ShaderDefines::new()),
            &ProcessingOptions::default(),
        )
        .expect_err("unregistered generator must fail");
    assert!(matches!(err, RenderError::UnknownGenerator(name) if name == "missing"));
}

// ============================================================================
// Removal / Invalidation Tests
// ============================================================================

#[test]
fn removal_leaves_other_variants_untouched() {
    let mut device = RecordingDevice::new();
    let (mut cache, _) = cache_with_generator();
    let plain = forward_options(ShaderDefines::new());
    let mut fog_defines = ShaderDefines::new();
    fog_defines.set("FOG", "exp");
    let fogged = forward_options(fog_defines);
    let processing = ProcessingOptions::default();

    let a = cache
        .get_program(&mut device, "test", &plain, &processing)
        .expect("a");
    let b = cache
        .get_program(&mut device, "test", &fogged, &processing)
        .expect("b");

    cache.remove_shader(&mut device, &a);
    assert_eq!(cache.variant_count(), 1);
    assert_eq!(device.count(|c| matches!(c, Call::DestroyPipeline(_))), 1);

    let b_again = cache
        .get_program(&mut device, "test", &fogged, &processing)
        .expect("b again");
    assert!(
        Arc::ptr_eq(&b, &b_again),
        "removing one variant must not evict others"
    );
}

#[test]
fn removed_variant_is_recompiled_on_next_request() {
    let mut device = RecordingDevice::new();
    let (mut cache, _) = cache_with_generator();
    let options = forward_options(ShaderDefines::new());
    let processing = ProcessingOptions::default();

    let a = cache
        .get_program(&mut device, "test", &options, &processing)
        .expect("a");
    cache.remove_shader(&mut device, &a);
    let again = cache
        .get_program(&mut device, "test", &options, &processing)
        .expect("again");

    assert!(!Arc::ptr_eq(&a, &again));
    assert_eq!(device.count(|c| matches!(c, Call::CreatePipeline(_))), 2);
}

#[test]
fn invalidating_a_generator_drops_only_its_variants() {
    let mut device = RecordingDevice::new();
    let mut cache = ShaderVariantCache::new();
    let (gen_a, _) = CountingGenerator::new();
    let (gen_b, _) = CountingGenerator::new();
    cache.register_generator("test", Box::new(gen_a));
    cache.register_generator("other", Box::new(gen_b));
    let options = forward_options(ShaderDefines::new());
    let processing = ProcessingOptions::default();

    cache
        .get_program(&mut device, "test", &options, &processing)
        .expect("test variant");
    let kept = cache
        .get_program(&mut device, "other", &options, &processing)
        .expect("other variant");

    cache.invalidate_generator(&mut device, "test");

    assert_eq!(cache.definition_count(), 1);
    assert_eq!(cache.variant_count(), 1);
    let kept_again = cache
        .get_program(&mut device, "other", &options, &processing)
        .expect("other again");
    assert!(Arc::ptr_eq(&kept, &kept_again));
}

#[test]
fn clear_destroys_every_pipeline() {
    let mut device = RecordingDevice::new();
    let (mut cache, _) = cache_with_generator();
    let processing = ProcessingOptions::default();

    let mut defines = ShaderDefines::new();
    cache
        .get_program(
            &mut device,
            "test",
            &forward_options(defines.clone()),
            &processing,
        )
        .expect("first");
    defines.enable("SKIN");
    cache
        .get_program(&mut device, "test", &forward_options(defines), &processing)
        .expect("second");

    cache.clear(&mut device);

    assert_eq!(cache.variant_count(), 0);
    assert_eq!(cache.definition_count(), 0);
    assert_eq!(device.count(|c| matches!(c, Call::DestroyPipeline(_))), 2);
}
