//! Graphics Device Abstraction
//!
//! The scheduling core never talks to a concrete graphics API. Everything it
//! needs from the GPU (pipeline creation and binding, render state, uniform
//! upload, buffer binds, draw submission) goes through the [`GraphicsDevice`]
//! trait, and backends own the resources behind the opaque handle newtypes.
//!
//! The state types in this module mirror the pipeline state a backend cares
//! about (blend, depth, stencil, bias) with plain `PartialEq` value types so
//! the [`TrackedEncoder`] can drop redundant state changes by comparison
//! instead of re-issuing every call.

use smallvec::SmallVec;

use crate::shader::{CompiledShader, ProcessingOptions, ShaderDefinition};

// ─── Resource Handles ────────────────────────────────────────────────────────

/// Backend-owned compiled pipeline object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u32);

/// Backend-owned texture (shadow map, cookie, grab capture…).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Backend-owned vertex or index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Backend-owned render target (surface, offscreen target, shadow target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(pub u64);

/// Backend-owned skinning resource (bone texture / matrix buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkinHandle(pub u64);

/// Backend-owned morph-target resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MorphHandle(pub u64);

// ─── Render State ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// One blend equation (factors + operation) for a color or alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub op: BlendOp,
}

impl BlendComponent {
    pub const ALPHA: Self = Self {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
        op: BlendOp::Add,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    /// Standard premultiplied-free alpha blending.
    pub const ALPHA_BLENDING: Self = Self {
        color: BlendComponent::ALPHA,
        alpha: BlendComponent::ALPHA,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub write: bool,
    pub test: bool,
    pub func: CompareFunc,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            write: true,
            test: true,
            func: CompareFunc::LessEqual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFace {
    pub func: CompareFunc,
    pub reference: u32,
    pub read_mask: u32,
    pub write_mask: u32,
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
}

impl Default for StencilFace {
    fn default() -> Self {
        Self {
            func: CompareFunc::Always,
            reference: 0,
            read_mask: 0xFF,
            write_mask: 0xFF,
            fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            pass: StencilOp::Keep,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StencilState {
    pub front: StencilFace,
    pub back: StencilFace,
}

/// Polygon depth bias, used by shadow-casting materials.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthBias {
    pub constant: f32,
    pub slope_scale: f32,
}

impl DepthBias {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.constant == 0.0 && self.slope_scale == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

impl CullMode {
    /// The mode with front/back swapped, for mirrored or flipped rendering.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

/// Complete material-level render state applied on a material switch.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub blend: Option<BlendState>,
    pub depth: DepthState,
    pub stencil: Option<StencilState>,
    /// Alpha-test cutoff; `None` disables alpha testing.
    pub alpha_test: Option<f32>,
    pub depth_bias: DepthBias,
    pub cull: CullMode,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            blend: None,
            depth: DepthState::default(),
            stencil: None,
            alpha_test: None,
            depth_bias: DepthBias::default(),
            cull: CullMode::Back,
        }
    }
}

// ─── Uniforms, Viewports, Clears ─────────────────────────────────────────────

/// A typed uniform value crossing the device boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    FloatArray(Vec<f32>),
    Texture(TextureHandle),
}

impl From<glam::Mat4> for UniformValue {
    fn from(m: glam::Mat4) -> Self {
        Self::Mat4(m.to_cols_array())
    }
}

impl From<glam::Vec3> for UniformValue {
    fn from(v: glam::Vec3) -> Self {
        Self::Vec3(v.to_array())
    }
}

/// Viewport rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

bitflags::bitflags! {
    /// Which target surfaces a pass clears before rendering.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u8 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Clear operation issued once at the start of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearOps {
    pub flags: ClearFlags,
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

/// What a grab pass captures from the active target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrabKind {
    /// Scene color, for refraction-style sampling.
    Color,
    /// Scene depth, for soft particles / depth-aware effects.
    Depth,
}

/// A single draw submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    /// Index count when indexed, vertex count otherwise.
    pub count: u32,
    pub indexed: bool,
    pub instances: u32,
}

// ─── GraphicsDevice ──────────────────────────────────────────────────────────

/// The contract a rendering backend implements for this core.
///
/// The core issues calls strictly from one thread per frame; implementations
/// may submit asynchronously to the GPU but must preserve call order.
pub trait GraphicsDevice {
    /// Create a backend pipeline from a generated shader definition processed
    /// against the given options (uniform-buffer layouts, vertex bindings).
    fn create_pipeline(
        &mut self,
        definition: &ShaderDefinition,
        processing: &ProcessingOptions,
    ) -> PipelineHandle;

    /// Destroy a pipeline previously returned by [`Self::create_pipeline`].
    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    /// Bind a pipeline for subsequent draws. Returns `false` when the
    /// pipeline failed to compile or link; the caller treats that as a
    /// non-fatal, per-pipeline condition.
    fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> bool;

    /// Bind a render target (`None` binds the default surface).
    fn set_render_target(&mut self, target: Option<TargetHandle>);

    /// Pixel dimensions of a target, used to resolve normalized camera rects.
    fn target_size(&self, target: Option<TargetHandle>) -> (u32, u32);

    /// Clear parts of the active target.
    fn clear(&mut self, ops: &ClearOps);

    fn set_viewport(&mut self, viewport: Viewport);

    /// Apply material-level blend/depth/stencil/alpha-test/bias state.
    fn set_render_state(&mut self, state: &RenderState);

    /// Per-draw cull mode override.
    fn set_cull_mode(&mut self, cull: CullMode);

    fn set_uniform(&mut self, name: &str, value: UniformValue);

    fn bind_vertex_buffers(&mut self, buffers: &[BufferHandle]);

    fn bind_index_buffer(&mut self, buffer: Option<BufferHandle>);

    fn bind_skin(&mut self, skin: SkinHandle);

    fn bind_morph(&mut self, morph: MorphHandle);

    fn draw(&mut self, primitive: Primitive);

    /// Capture the active target's color or depth into a backend-managed
    /// texture for later sampling (grab pass).
    fn resolve_grab(&mut self, kind: GrabKind, target: Option<TargetHandle>);

    /// Copy a texture into a region of a target (cookie atlas fills).
    fn blit_texture(
        &mut self,
        source: TextureHandle,
        target: Option<TargetHandle>,
        viewport: Viewport,
    );
}

// ─── TrackedEncoder ──────────────────────────────────────────────────────────

/// Device wrapper that drops redundant state changes.
///
/// One encoder exists per render pass; state tracking intentionally resets at
/// pass boundaries. Pipeline and buffer binds are deduplicated by handle id,
/// render state and cull mode by value comparison. The encoder also feeds the
/// per-frame statistics accumulator so callers do not count calls themselves.
pub struct TrackedEncoder<'a> {
    device: &'a mut dyn GraphicsDevice,
    stats: &'a mut crate::renderer::FrameStats,
    current_pipeline: Option<PipelineHandle>,
    current_state: Option<RenderState>,
    current_cull: Option<CullMode>,
    current_vertex_buffers: SmallVec<[BufferHandle; 4]>,
    current_index_buffer: Option<Option<BufferHandle>>,
}

impl<'a> TrackedEncoder<'a> {
    pub fn new(
        device: &'a mut dyn GraphicsDevice,
        stats: &'a mut crate::renderer::FrameStats,
    ) -> Self {
        Self {
            device,
            stats,
            current_pipeline: None,
            current_state: None,
            current_cull: None,
            current_vertex_buffers: SmallVec::new(),
            current_index_buffer: None,
        }
    }

    /// Bind a target and clear it. Always issued (pass start).
    pub fn begin_target(&mut self, target: Option<TargetHandle>, clear: Option<&ClearOps>) {
        self.device.set_render_target(target);
        self.stats.render_target_binds += 1;
        if let Some(ops) = clear {
            if !ops.flags.is_empty() {
                self.device.clear(ops);
            }
        }
    }

    /// Bind a compiled shader's pipeline. Returns `false` on compile failure
    /// (reported by the backend on first bind).
    pub fn bind_shader(&mut self, shader: &CompiledShader) -> bool {
        if self.current_pipeline == Some(shader.pipeline()) {
            return true;
        }
        let ok = self.device.bind_pipeline(shader.pipeline());
        if ok {
            self.current_pipeline = Some(shader.pipeline());
            self.stats.pipeline_binds += 1;
        }
        ok
    }

    pub fn set_render_state(&mut self, state: &RenderState) {
        if self.current_state.as_ref() != Some(state) {
            self.device.set_render_state(state);
            self.current_state = Some(state.clone());
            // render state carries the material's base cull mode
            self.current_cull = Some(state.cull);
        }
    }

    pub fn set_cull_mode(&mut self, cull: CullMode) {
        if self.current_cull != Some(cull) {
            self.device.set_cull_mode(cull);
            self.current_cull = Some(cull);
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.device.set_viewport(viewport);
    }

    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.device.set_uniform(name, value);
    }

    pub fn bind_vertex_buffers(&mut self, buffers: &[BufferHandle]) {
        if self.current_vertex_buffers.as_slice() != buffers {
            self.device.bind_vertex_buffers(buffers);
            self.current_vertex_buffers = SmallVec::from_slice(buffers);
        }
    }

    pub fn bind_index_buffer(&mut self, buffer: Option<BufferHandle>) {
        if self.current_index_buffer != Some(buffer) {
            self.device.bind_index_buffer(buffer);
            self.current_index_buffer = Some(buffer);
        }
    }

    pub fn bind_skin(&mut self, skin: SkinHandle) {
        self.device.bind_skin(skin);
    }

    pub fn bind_morph(&mut self, morph: MorphHandle) {
        self.device.bind_morph(morph);
    }

    pub fn draw(&mut self, primitive: Primitive) {
        self.device.draw(primitive);
        self.stats.draw_calls += 1;
    }

    pub fn resolve_grab(&mut self, kind: GrabKind, target: Option<TargetHandle>) {
        self.device.resolve_grab(kind, target);
    }

    pub fn blit_texture(
        &mut self,
        source: TextureHandle,
        target: Option<TargetHandle>,
        viewport: Viewport,
    ) {
        self.device.blit_texture(source, target, viewport);
    }

    /// Statistics accumulator, for counters the dispatcher owns directly.
    pub fn stats(&mut self) -> &mut crate::renderer::FrameStats {
        self.stats
    }
}
