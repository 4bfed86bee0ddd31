//! Shader variant generation and caching.

mod cache;
mod generator;

pub use cache::{CompiledShader, ShaderVariantCache, TotalKey};
pub use generator::{
    GenerationOptions, ProcessingOptions, ShaderDefines, ShaderDefinition, ShaderGenerator,
    ShaderPass,
};
