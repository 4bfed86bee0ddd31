//! Shader Variant Cache
//!
//! Two cache levels sit between materials and compiled pipelines:
//!
//! 1. generation key → generated [`ShaderDefinition`] (source text), and
//! 2. total key (generation + processing) → compiled pipeline.
//!
//! Equal keys always return the same `Arc`, so callers compare shader
//! variants by pointer identity to detect pipeline switches. Compile failures
//! are sticky per variant and non-fatal: a failed variant stays cached, is
//! skipped at dispatch, and never retries until the cache is invalidated.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;

use crate::device::{GraphicsDevice, PipelineHandle};
use crate::errors::{RenderError, Result};
use crate::shader::generator::{
    GenerationOptions, ProcessingOptions, ShaderDefinition, ShaderGenerator,
};

/// Full identity of one compiled variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TotalKey {
    pub generation: u64,
    pub processing: u64,
}

/// A compiled pipeline plus its cache identity.
///
/// The failure flag is set by the dispatcher when the backend rejects the
/// pipeline on first bind; every `Arc` holder observes it.
#[derive(Debug)]
pub struct CompiledShader {
    pipeline: PipelineHandle,
    total_key: TotalKey,
    label: String,
    failed: AtomicBool,
}

impl CompiledShader {
    #[must_use]
    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }

    #[must_use]
    pub fn total_key(&self) -> TotalKey {
        self.total_key
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

struct CachedDefinition {
    definition: Arc<ShaderDefinition>,
    generator: String,
}

/// The per-device shader variant cache.
pub struct ShaderVariantCache {
    generators: FxHashMap<String, Box<dyn ShaderGenerator>>,
    definitions: FxHashMap<u64, CachedDefinition>,
    processed: FxHashMap<TotalKey, Arc<CompiledShader>>,
    /// Guards against removal re-entering the cache mid-clear.
    clearing: bool,
}

impl Default for ShaderVariantCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderVariantCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            generators: FxHashMap::default(),
            definitions: FxHashMap::default(),
            processed: FxHashMap::default(),
            clearing: false,
        }
    }

    /// Register a generator under a material-facing name. Replaces any
    /// previous generator of the same name without touching cached variants.
    pub fn register_generator(
        &mut self,
        name: impl Into<String>,
        generator: Box<dyn ShaderGenerator>,
    ) {
        self.generators.insert(name.into(), generator);
    }

    #[must_use]
    pub fn has_generator(&self, name: &str) -> bool {
        self.generators.contains_key(name)
    }

    /// Resolve a compiled variant, generating and compiling on miss.
    ///
    /// Repeated calls with key-equal options return clones of the same `Arc`.
    pub fn get_program(
        &mut self,
        device: &mut dyn GraphicsDevice,
        generator: &str,
        options: &GenerationOptions,
        processing: &ProcessingOptions,
    ) -> Result<Arc<CompiledShader>> {
        let generation = options.generation_key(generator);
        let total = TotalKey {
            generation,
            processing: processing.processing_key(),
        };

        if let Some(shader) = self.processed.get(&total) {
            return Ok(Arc::clone(shader));
        }

        let definition = match self.definitions.get(&generation) {
            Some(cached) => Arc::clone(&cached.definition),
            None => {
                let source = self
                    .generators
                    .get(generator)
                    .ok_or_else(|| RenderError::UnknownGenerator(generator.to_string()))?;
                let definition = Arc::new(source.create_definition(options).map_err(|e| {
                    RenderError::ShaderGeneration {
                        generator: generator.to_string(),
                        reason: e.to_string(),
                    }
                })?);
                log::debug!(
                    "generated shader '{}' (generation key {generation:#018x})",
                    definition.name
                );
                self.definitions.insert(
                    generation,
                    CachedDefinition {
                        definition: Arc::clone(&definition),
                        generator: generator.to_string(),
                    },
                );
                definition
            }
        };

        let pipeline = device.create_pipeline(&definition, processing);
        let shader = Arc::new(CompiledShader {
            pipeline,
            total_key: total,
            label: definition.name.clone(),
            failed: AtomicBool::new(false),
        });
        self.processed.insert(total, Arc::clone(&shader));
        Ok(shader)
    }

    /// Drop one compiled variant and destroy its pipeline. Other variants,
    /// including ones sharing the same generated definition, are untouched.
    ///
    /// No-op while a full clear is in progress.
    pub fn remove_shader(&mut self, device: &mut dyn GraphicsDevice, shader: &CompiledShader) {
        if self.clearing {
            return;
        }
        if self.processed.remove(&shader.total_key()).is_some() {
            device.destroy_pipeline(shader.pipeline());
        }
    }

    /// Drop every cached definition and variant produced by one generator.
    /// Used when a generator's source templates change at runtime.
    pub fn invalidate_generator(&mut self, device: &mut dyn GraphicsDevice, name: &str) {
        self.clearing = true;
        let removed: Vec<u64> = self
            .definitions
            .iter()
            .filter(|(_, cached)| cached.generator == name)
            .map(|(&key, _)| key)
            .collect();
        for key in &removed {
            self.definitions.remove(key);
        }
        self.processed.retain(|total, shader| {
            if removed.contains(&total.generation) {
                device.destroy_pipeline(shader.pipeline());
                false
            } else {
                true
            }
        });
        self.clearing = false;
        log::debug!("invalidated {} definitions for generator '{name}'", removed.len());
    }

    /// Drop the entire cache and destroy all pipelines.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        self.clearing = true;
        for shader in self.processed.values() {
            device.destroy_pipeline(shader.pipeline());
        }
        self.processed.clear();
        self.definitions.clear();
        self.clearing = false;
    }

    #[must_use]
    pub fn definition_count(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.processed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{
        BufferHandle, ClearOps, CullMode, GrabKind, MorphHandle, Primitive, RenderState,
        SkinHandle, TargetHandle, TextureHandle, UniformValue, Viewport,
    };
    use crate::scene::DrawFlags;
    use crate::shader::generator::{ShaderDefines, ShaderPass};

    #[derive(Default)]
    struct NullDevice {
        created: u32,
        destroyed: u32,
    }

    impl GraphicsDevice for NullDevice {
        fn create_pipeline(
            &mut self,
            _definition: &ShaderDefinition,
            _processing: &ProcessingOptions,
        ) -> PipelineHandle {
            self.created += 1;
            PipelineHandle(self.created)
        }

        fn destroy_pipeline(&mut self, _pipeline: PipelineHandle) {
            self.destroyed += 1;
        }

        fn bind_pipeline(&mut self, _pipeline: PipelineHandle) -> bool {
            true
        }

        fn set_render_target(&mut self, _target: Option<TargetHandle>) {}

        fn target_size(&self, _target: Option<TargetHandle>) -> (u32, u32) {
            (1, 1)
        }

        fn clear(&mut self, _ops: &ClearOps) {}

        fn set_viewport(&mut self, _viewport: Viewport) {}

        fn set_render_state(&mut self, _state: &RenderState) {}

        fn set_cull_mode(&mut self, _cull: CullMode) {}

        fn set_uniform(&mut self, _name: &str, _value: UniformValue) {}

        fn bind_vertex_buffers(&mut self, _buffers: &[BufferHandle]) {}

        fn bind_index_buffer(&mut self, _buffer: Option<BufferHandle>) {}

        fn bind_skin(&mut self, _skin: SkinHandle) {}

        fn bind_morph(&mut self, _morph: MorphHandle) {}

        fn draw(&mut self, _primitive: Primitive) {}

        fn resolve_grab(&mut self, _kind: GrabKind, _target: Option<TargetHandle>) {}

        fn blit_texture(
            &mut self,
            _source: TextureHandle,
            _target: Option<TargetHandle>,
            _viewport: Viewport,
        ) {
        }
    }

    struct FixedGenerator;

    impl ShaderGenerator for FixedGenerator {
        fn create_definition(&self, options: &GenerationOptions) -> Result<ShaderDefinition> {
            Ok(ShaderDefinition {
                name: format!("fixed-{:?}", options.pass),
                vertex_source: String::new(),
                fragment_source: String::new(),
                attributes: Vec::new(),
            })
        }
    }

    fn forward_options() -> GenerationOptions {
        GenerationOptions {
            pass: ShaderPass::Forward,
            defines: ShaderDefines::new(),
            light_hash: 0,
            draw_flags: DrawFlags::empty(),
            scene_key: 0,
        }
    }

    #[test]
    fn removal_is_a_no_op_while_clearing() {
        let mut device = NullDevice::default();
        let mut cache = ShaderVariantCache::new();
        cache.register_generator("fixed", Box::new(FixedGenerator));
        let shader = cache
            .get_program(
                &mut device,
                "fixed",
                &forward_options(),
                &ProcessingOptions::default(),
            )
            .expect("resolve");

        cache.clearing = true;
        cache.remove_shader(&mut device, &shader);
        assert_eq!(
            device.destroyed, 0,
            "removal mid-clear must not destroy the pipeline a second time"
        );
        assert_eq!(cache.variant_count(), 1, "mid-clear removal must not mutate the cache");

        cache.clearing = false;
        cache.remove_shader(&mut device, &shader);
        assert_eq!(device.destroyed, 1);
        assert_eq!(cache.variant_count(), 0);
    }
}
