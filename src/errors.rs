//! Error Types
//!
//! This module defines the error types used by the animation core.
//!
//! # Overview
//!
//! The main error type [`SinewError`] only covers the one-time paths:
//! - Import of raw scene data into a skeleton and vertex buffers
//! - Finalizing a bone hierarchy (cycle validation)
//! - Reading and writing the binary cache
//! - Parsing engine settings
//!
//! Per-frame work (pose writes, transform propagation, sampling, skinning)
//! never fails; degenerate numeric input is resolved by fallbacks instead.
//!
//! ```rust,ignore
//! use sinew::errors::{SinewError, Result};
//!
//! fn import(scene: &SceneData) -> Result<MeshAsset> {
//!     ImportConverter::default().convert(scene)
//! }
//! ```

use thiserror::Error;

/// The main error type for the animation core.
#[derive(Error, Debug)]
pub enum SinewError {
    // ========================================================================
    // Import Errors
    // ========================================================================
    /// The scene contains no mesh that could be converted.
    #[error("Scene contains no convertible mesh")]
    EmptyScene,

    /// A mesh has no control points.
    #[error("Mesh '{mesh}' has no control points")]
    NoControlPoints {
        /// Name of the offending mesh
        mesh: String,
    },

    /// A mesh has no polygons (or only degenerate ones).
    #[error("Mesh '{mesh}' has no polygons")]
    NoPolygons {
        /// Name of the offending mesh
        mesh: String,
    },

    /// A node, control point or bone index points outside its table.
    #[error("Invalid reference: {context} (index: {index})")]
    InvalidNodeReference {
        /// Description of what was being resolved
        context: String,
        /// The invalid index
        index: usize,
    },

    // ========================================================================
    // Hierarchy Errors
    // ========================================================================
    /// A parent chain loops back on itself.
    #[error("Bone hierarchy contains a cycle through bone '{bone}'")]
    CyclicBoneHierarchy {
        /// Name of a bone that could not be reached from any root
        bone: String,
    },

    // ========================================================================
    // Cache & I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A cached string was not valid UTF-8.
    #[error("Invalid UTF-8 in cache: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Cache content is structurally inconsistent.
    #[error("Corrupt cache: {0}")]
    CacheCorrupt(String),

    // ========================================================================
    // Settings Errors
    // ========================================================================
    /// JSON parsing error while reading settings.
    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] serde_json::Error),
}

/// Alias for `Result<T, SinewError>`.
pub type Result<T> = std::result::Result<T, SinewError>;
