//! Shader Generation Interface
//!
//! Materials do not carry shader source. They name a registered
//! [`ShaderGenerator`] and hand it a bundle of [`GenerationOptions`]; the
//! generator folds those options into a deterministic generation key and, on a
//! cache miss, emits a [`ShaderDefinition`] with the actual source text.
//! Processing (binding layouts, vertex formats) is keyed separately by
//! [`ProcessingOptions`] so one generated definition can back several
//! compiled pipelines.

use xxhash_rust::xxh3::Xxh3;

use crate::errors::Result;
use crate::scene::DrawFlags;

// ─── Shader Defines ──────────────────────────────────────────────────────────

/// An ordered set of preprocessor-style defines.
///
/// Kept sorted by key so that iteration order, and therefore every key and
/// hash derived from the set, is deterministic regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderDefines {
    entries: Vec<(String, String)>,
}

impl ShaderDefines {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a define.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.entries.binary_search_by(|(k, _)| k.as_str().cmp(&key)) {
            Ok(i) => self.entries[i].1 = value.into(),
            Err(i) => self.entries.insert(i, (key, value.into())),
        }
    }

    /// Insert a flag-style define with an empty value.
    pub fn enable(&mut self, key: impl Into<String>) {
        self.set(key, "");
    }

    pub fn remove(&mut self, key: &str) {
        if let Ok(i) = self.entries.binary_search_by(|(k, _)| k.as_str().cmp(key)) {
            self.entries.remove(i);
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .is_ok()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|i| self.entries[i].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn write_key(&self, hasher: &mut Xxh3) {
        for (k, v) in &self.entries {
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
            hasher.update(b";");
        }
    }
}

// ─── Generation Options ──────────────────────────────────────────────────────

/// The pass a shader variant is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderPass {
    Forward,
    ShadowDirectional,
    ShadowSpot,
    ShadowOmni,
    Depth,
    PostProcess,
}

impl ShaderPass {
    #[must_use]
    pub fn is_shadow(self) -> bool {
        matches!(
            self,
            Self::ShadowDirectional | Self::ShadowSpot | Self::ShadowOmni
        )
    }

    fn key_bits(self) -> u8 {
        match self {
            Self::Forward => 0,
            Self::ShadowDirectional => 1,
            Self::ShadowSpot => 2,
            Self::ShadowOmni => 3,
            Self::Depth => 4,
            Self::PostProcess => 5,
        }
    }
}

/// Everything that influences generated shader SOURCE for one draw.
///
/// Two draws whose options fold to the same generation key are guaranteed to
/// receive the same definition, so every field here must be covered by
/// [`GenerationOptions::generation_key`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    /// Target pass.
    pub pass: ShaderPass,
    /// Material-level defines (lit model, maps, channels…).
    pub defines: ShaderDefines,
    /// Hash of the layer's effective light list relevant to this draw.
    pub light_hash: u64,
    /// Geometry-derived flags (skinning, morphing, instancing…).
    pub draw_flags: DrawFlags,
    /// Scene-wide state mixed into every variant (fog, ambient mode…).
    pub scene_key: u64,
}

impl GenerationOptions {
    /// Fold the options into the deterministic generation key.
    #[must_use]
    pub fn generation_key(&self, generator: &str) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(generator.as_bytes());
        hasher.update(&[self.pass.key_bits()]);
        self.defines.write_key(&mut hasher);
        hasher.update(&self.light_hash.to_le_bytes());
        hasher.update(&self.draw_flags.bits().to_le_bytes());
        hasher.update(&self.scene_key.to_le_bytes());
        hasher.digest()
    }
}

// ─── Processing Options ──────────────────────────────────────────────────────

/// Everything that influences how a generated definition is compiled into a
/// pipeline, without changing its source: uniform-buffer layouts, bind-group
/// shapes and the mesh vertex format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProcessingOptions {
    pub view_uniform_format: u64,
    pub view_bind_group_format: u64,
    pub vertex_format: u64,
}

impl ProcessingOptions {
    #[must_use]
    pub fn processing_key(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(&self.view_uniform_format.to_le_bytes());
        hasher.update(&self.view_bind_group_format.to_le_bytes());
        hasher.update(&self.vertex_format.to_le_bytes());
        hasher.digest()
    }
}

// ─── Shader Definition ───────────────────────────────────────────────────────

/// Generated shader source plus the attribute names it consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderDefinition {
    /// Debug label, also used for compile-failure logging.
    pub name: String,
    pub vertex_source: String,
    pub fragment_source: String,
    pub attributes: Vec<String>,
}

// ─── Generator Trait ─────────────────────────────────────────────────────────

/// A named shader family registered with the variant cache.
///
/// `create_definition` is only called on a generation-key miss; it may be
/// expensive. It must be a pure function of the options: the cache assumes
/// equal keys mean interchangeable definitions.
pub trait ShaderGenerator {
    /// Emit the full shader definition for one set of options.
    fn create_definition(&self, options: &GenerationOptions) -> Result<ShaderDefinition>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_with(defines: ShaderDefines) -> GenerationOptions {
        GenerationOptions {
            pass: ShaderPass::Forward,
            defines,
            light_hash: 7,
            draw_flags: DrawFlags::empty(),
            scene_key: 0,
        }
    }

    #[test]
    fn defines_stay_sorted_regardless_of_insertion_order() {
        let mut a = ShaderDefines::new();
        a.set("FOG", "linear");
        a.enable("SKIN");
        a.set("ALPHA_TEST", "0.5");

        let mut b = ShaderDefines::new();
        b.set("ALPHA_TEST", "0.5");
        b.set("FOG", "linear");
        b.enable("SKIN");

        assert_eq!(a, b);
        assert_eq!(
            options_with(a).generation_key("standard"),
            options_with(b).generation_key("standard"),
        );
    }

    #[test]
    fn set_replaces_existing_value() {
        let mut d = ShaderDefines::new();
        d.set("FOG", "linear");
        d.set("FOG", "exp");
        assert_eq!(d.get("FOG"), Some("exp"));
        assert_eq!(d.iter().count(), 1);
    }

    #[test]
    fn key_changes_with_any_input() {
        let base = options_with(ShaderDefines::new());
        let key = base.generation_key("standard");

        let mut other = base.clone();
        other.pass = ShaderPass::ShadowSpot;
        assert_ne!(key, other.generation_key("standard"));

        let mut other = base.clone();
        other.light_hash = 8;
        assert_ne!(key, other.generation_key("standard"));

        assert_ne!(key, base.generation_key("toon"));
    }
}
