//! Engine Settings
//!
//! Configuration for the two one-time/per-frame subsystems that have tunable
//! behaviour: the import converter and the CPU skinning engine.
//!
//! All settings structs implement [`Default`] and deserialize from JSON with
//! missing fields falling back to their defaults.
//!
//! ```rust,ignore
//! use sinew::settings::{EngineSettings, SkinningMode};
//!
//! let settings = EngineSettings::from_json_str(r#"{ "skinning": { "mode": "Gpu" } }"#)?;
//! assert_eq!(settings.skinning.mode, SkinningMode::Gpu);
//! assert_eq!(settings.import.max_influences, 4);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::render::vertex::MAX_BONE_INFLUENCES;

// ---------------------------------------------------------------------------
// SkinningMode
// ---------------------------------------------------------------------------

/// Where vertex deformation runs.
///
/// | Mode  | CPU skinning engine            | Output buffer                 |
/// |-------|--------------------------------|-------------------------------|
/// | `Cpu` | fills the staging buffer       | deformed vertices each frame  |
/// | `Gpu` | idle                           | bind-pose vertices, untouched |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkinningMode {
    #[default]
    Cpu,
    Gpu,
}

// ---------------------------------------------------------------------------
// ImportSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Influences kept per vertex after sorting by weight. Clamped to
    /// [`MAX_BONE_INFLUENCES`].
    pub max_influences: usize,

    /// Cluster weights at or below this value are dropped before sorting.
    pub weight_epsilon: f32,

    /// Merge polygon corners that share position, normal, uv, material and
    /// influences into one output vertex.
    pub deduplicate_vertices: bool,

    /// Derive face normals for meshes that carry no normal layer.
    pub compute_missing_normals: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_influences: MAX_BONE_INFLUENCES,
            weight_epsilon: 0.0,
            deduplicate_vertices: true,
            compute_missing_normals: true,
        }
    }
}

impl ImportSettings {
    #[inline]
    #[must_use]
    pub fn effective_max_influences(&self) -> usize {
        self.max_influences.clamp(1, MAX_BONE_INFLUENCES)
    }
}

// ---------------------------------------------------------------------------
// SkinningSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinningSettings {
    pub mode: SkinningMode,

    /// Blended results are divided by the weight sum when it differs from 1
    /// by more than this.
    pub weight_tolerance: f32,

    /// Upper-3x3 determinants below this skip the inverse-transpose for
    /// normals and use the plain matrix.
    pub singular_determinant_epsilon: f32,

    /// Also deform tangents (plain upper 3x3, handedness preserved).
    pub skin_tangents: bool,
}

impl Default for SkinningSettings {
    fn default() -> Self {
        Self {
            mode: SkinningMode::Cpu,
            weight_tolerance: 1e-4,
            singular_determinant_epsilon: 1e-8,
            skin_tangents: true,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub import: ImportSettings,
    pub skinning: SkinningSettings,
}

impl EngineSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
