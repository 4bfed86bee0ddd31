//! Shared test fixtures: a call-recording graphics device, a trivial shader
//! generator, and a minimal material implementation.

// not every test binary touches every fixture
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashSet;
use smallvec::smallvec;

use aurora::device::{
    BufferHandle, ClearFlags, ClearOps, CullMode, GrabKind, GraphicsDevice, MorphHandle,
    PipelineHandle, Primitive, RenderState, SkinHandle, TargetHandle, TextureHandle, UniformValue,
    Viewport,
};
use aurora::errors::{RenderError, Result};
use aurora::scene::{DrawCall, Material, MaterialKey, Mesh};
use aurora::shader::{
    GenerationOptions, ProcessingOptions, ShaderDefines, ShaderDefinition, ShaderGenerator,
    ShaderPass,
};

// ============================================================================
// Recording Device
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreatePipeline(u32),
    DestroyPipeline(u32),
    BindPipeline(u32),
    SetRenderTarget(Option<TargetHandle>),
    Clear(ClearFlags),
    SetViewport(Viewport),
    SetRenderState,
    SetCullMode(CullMode),
    SetUniform(String),
    BindVertexBuffers,
    BindIndexBuffer,
    BindSkin,
    BindMorph,
    Draw(Primitive),
    ResolveGrab(GrabKind),
    BlitTexture,
}

/// Records every device call in order; all targets report 800x600.
#[derive(Default)]
pub struct RecordingDevice {
    pub calls: Vec<Call>,
    next_pipeline: u32,
    /// Pipelines whose bind reports failure.
    pub fail_pipelines: FxHashSet<u32>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn draws(&self) -> usize {
        self.count(|c| matches!(c, Call::Draw(_)))
    }

    pub fn pipeline_binds(&self) -> usize {
        self.count(|c| matches!(c, Call::BindPipeline(_)))
    }

    pub fn target_binds(&self) -> usize {
        self.count(|c| matches!(c, Call::SetRenderTarget(_)))
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_pipeline(
        &mut self,
        _definition: &ShaderDefinition,
        _processing: &ProcessingOptions,
    ) -> PipelineHandle {
        let id = self.next_pipeline;
        self.next_pipeline += 1;
        self.calls.push(Call::CreatePipeline(id));
        PipelineHandle(id)
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        self.calls.push(Call::DestroyPipeline(pipeline.0));
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> bool {
        if self.fail_pipelines.contains(&pipeline.0) {
            return false;
        }
        self.calls.push(Call::BindPipeline(pipeline.0));
        true
    }

    fn set_render_target(&mut self, target: Option<TargetHandle>) {
        self.calls.push(Call::SetRenderTarget(target));
    }

    fn target_size(&self, _target: Option<TargetHandle>) -> (u32, u32) {
        (800, 600)
    }

    fn clear(&mut self, ops: &ClearOps) {
        self.calls.push(Call::Clear(ops.flags));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(Call::SetViewport(viewport));
    }

    fn set_render_state(&mut self, _state: &RenderState) {
        self.calls.push(Call::SetRenderState);
    }

    fn set_cull_mode(&mut self, cull: CullMode) {
        self.calls.push(Call::SetCullMode(cull));
    }

    fn set_uniform(&mut self, name: &str, _value: UniformValue) {
        self.calls.push(Call::SetUniform(name.to_string()));
    }

    fn bind_vertex_buffers(&mut self, _buffers: &[BufferHandle]) {
        self.calls.push(Call::BindVertexBuffers);
    }

    fn bind_index_buffer(&mut self, _buffer: Option<BufferHandle>) {
        self.calls.push(Call::BindIndexBuffer);
    }

    fn bind_skin(&mut self, _skin: SkinHandle) {
        self.calls.push(Call::BindSkin);
    }

    fn bind_morph(&mut self, _morph: MorphHandle) {
        self.calls.push(Call::BindMorph);
    }

    fn draw(&mut self, primitive: Primitive) {
        self.calls.push(Call::Draw(primitive));
    }

    fn resolve_grab(&mut self, kind: GrabKind, _target: Option<TargetHandle>) {
        self.calls.push(Call::ResolveGrab(kind));
    }

    fn blit_texture(
        &mut self,
        _source: TextureHandle,
        _target: Option<TargetHandle>,
        _viewport: Viewport,
    ) {
        self.calls.push(Call::BlitTexture);
    }
}

// ============================================================================
// Test Generator
// ============================================================================

/// Emits a fixed definition and counts how often it actually generates.
pub struct CountingGenerator {
    pub generated: Arc<AtomicUsize>,
}

impl CountingGenerator {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        (
            Self {
                generated: Arc::clone(&counter),
            },
            counter,
        )
    }
}

impl ShaderGenerator for CountingGenerator {
    fn create_definition(&self, options: &GenerationOptions) -> Result<ShaderDefinition> {
        self.generated.fetch_add(1, Ordering::Relaxed);
        Ok(ShaderDefinition {
            name: format!("test-{:?}", options.pass),
            vertex_source: "void main() {}".into(),
            fragment_source: "void main() {}".into(),
            attributes: vec!["position".into()],
        })
    }
}

/// Rejects every option combination, standing in for a generator handed
/// malformed defines.
pub struct FailingGenerator;

impl ShaderGenerator for FailingGenerator {
    fn create_definition(&self, _options: &GenerationOptions) -> Result<ShaderDefinition> {
        Err(RenderError::ShaderGeneration {
            generator: "test".into(),
            reason: "unsupported define combination".into(),
        })
    }
}

// ============================================================================
// Test Material
// ============================================================================

pub struct TestMaterial {
    pub name: String,
    pub defines: ShaderDefines,
    pub state: RenderState,
    pub params: Vec<(String, UniformValue)>,
    pub dirty: bool,
    pub updates: usize,
}

impl TestMaterial {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            defines: ShaderDefines::new(),
            state: RenderState::default(),
            params: Vec::new(),
            dirty: false,
            updates: 0,
        }
    }
}

impl Material for TestMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn generator(&self) -> &str {
        "test"
    }

    fn defines(&self, _pass: ShaderPass) -> ShaderDefines {
        self.defines.clone()
    }

    fn render_state(&self) -> &RenderState {
        &self.state
    }

    fn parameters(&self) -> &[(String, UniformValue)] {
        &self.params
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn update(&mut self) {
        self.dirty = false;
        self.updates += 1;
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn quad_mesh() -> Mesh {
    Mesh {
        vertex_buffers: smallvec![BufferHandle(1)],
        index_buffer: Some(BufferHandle(2)),
        count: 6,
        vertex_format: 1,
    }
}

pub fn draw(material: MaterialKey) -> DrawCall {
    DrawCall::new(quad_mesh(), material)
}

pub fn forward_options(defines: ShaderDefines) -> GenerationOptions {
    GenerationOptions {
        pass: ShaderPass::Forward,
        defines,
        light_hash: 0,
        draw_flags: aurora::scene::DrawFlags::empty(),
        scene_key: 0,
    }
}
