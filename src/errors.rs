//! Error Types
//!
//! This module defines the error types used throughout the scheduling core.
//!
//! # Overview
//!
//! The main error type [`RenderError`] covers the failure modes of frame
//! construction:
//! - Shader source generation failures (fatal for the frame)
//! - Lookups of unregistered shader generators
//!
//! Shader *compile* failures are deliberately not represented here: they are
//! recorded on the compiled pipeline object and cause the dispatcher to skip
//! the affected draw calls instead of aborting the pass. Likewise, stale
//! scene references (a removed camera, material, or draw call) degrade to a
//! logged skip rather than an error.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, RenderError>`.

use thiserror::Error;

/// The main error type for the frame scheduling core.
#[derive(Error, Debug)]
pub enum RenderError {
    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// No shader generator is registered under the requested name.
    #[error("No shader generator registered for: {0}")]
    UnknownGenerator(String),

    /// A shader generator failed to produce a source-level definition.
    ///
    /// This indicates a malformed option combination, i.e. a configuration
    /// bug rather than a transient runtime condition.
    #[error("Shader generation failed for '{generator}': {reason}")]
    ShaderGeneration {
        /// Name of the generator that failed
        generator: String,
        /// Generator-provided failure description
        reason: String,
    },
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;
