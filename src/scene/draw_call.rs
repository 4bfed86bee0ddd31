//! Draw calls and materials.

use glam::{Mat4, Vec3};
use smallvec::SmallVec;

use crate::device::{BufferHandle, MorphHandle, Primitive, RenderState, SkinHandle, UniformValue};
use crate::shader::{ShaderDefines, ShaderPass};

slotmap::new_key_type! {
    pub struct DrawCallKey;
    pub struct MaterialKey;
}

bitflags::bitflags! {
    /// Geometry-derived properties that select shader code paths.
    ///
    /// Two draw calls sharing a material but differing in any of these flags
    /// need different shader variants, so the preparer treats a flag change
    /// as a material switch even when the material key is identical.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawFlags: u32 {
        const SKINNED       = 1 << 0;
        const MORPHED       = 1 << 1;
        const UV1           = 1 << 2;
        const VERTEX_COLORS = 1 << 3;
        const INSTANCED     = 1 << 4;
        const SCREEN_SPACE  = 1 << 5;
    }
}

/// GPU geometry referenced by a draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertex_buffers: SmallVec<[BufferHandle; 4]>,
    pub index_buffer: Option<BufferHandle>,
    /// Index count when indexed, vertex count otherwise.
    pub count: u32,
    /// Opaque vertex-layout id fed into pipeline processing.
    pub vertex_format: u64,
}

impl Mesh {
    #[must_use]
    pub fn primitive(&self, instances: u32) -> Primitive {
        Primitive {
            count: self.count,
            indexed: self.index_buffer.is_some(),
            instances,
        }
    }
}

/// One renderable instance inside a layer.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub mesh: Mesh,
    pub material: MaterialKey,
    pub world: Mat4,
    /// World-space center used for distance sorting.
    pub center: Vec3,
    /// Bitmask matched against light masks; a draw only receives lights
    /// whose mask intersects this one.
    pub light_mask: u32,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub skin: Option<SkinHandle>,
    pub morph: Option<MorphHandle>,
    pub flags: DrawFlags,
    /// Per-instance uniform overrides applied after material parameters.
    pub parameters: Vec<(String, UniformValue)>,
    /// Negative-scale geometry renders with inverted winding.
    pub flip_faces: bool,
    pub instances: u32,
    pub visible: bool,
    /// Explicit ordering for manually sorted sub-layers.
    pub draw_order: u32,
    /// Precomputed material/mesh batching key for state-sorted sub-layers.
    pub sort_key: u64,
}

impl DrawCall {
    #[must_use]
    pub fn new(mesh: Mesh, material: MaterialKey) -> Self {
        Self {
            mesh,
            material,
            world: Mat4::IDENTITY,
            center: Vec3::ZERO,
            light_mask: u32::MAX,
            cast_shadow: false,
            receive_shadow: true,
            skin: None,
            morph: None,
            flags: DrawFlags::empty(),
            parameters: Vec::new(),
            flip_faces: false,
            instances: 1,
            visible: true,
            draw_order: 0,
            sort_key: 0,
        }
    }
}

/// A shader-producing material.
///
/// Materials do not hold compiled shaders. They expose the name of a
/// registered generator plus the defines that feed variant-key folding; the
/// preparer resolves the actual variant through the cache each frame.
pub trait Material {
    /// Debug name, used in logs only.
    fn name(&self) -> &str;

    /// Name of the shader generator this material renders with.
    fn generator(&self) -> &str;

    /// Source-shaping defines for the given pass.
    fn defines(&self, pass: ShaderPass) -> ShaderDefines;

    /// Blend/depth/stencil/cull state bound on a material switch.
    fn render_state(&self) -> &RenderState;

    /// Uniform parameters bound on a material switch.
    fn parameters(&self) -> &[(String, UniformValue)];

    /// Whether internal uniform state needs recomputing before use.
    fn is_dirty(&self) -> bool;

    /// Recompute derived uniform values and clear the dirty flag.
    fn update(&mut self);

    /// Transparent materials sort back-to-front and blend.
    fn transparent(&self) -> bool {
        self.render_state().blend.is_some()
    }
}
