//! CPU vertex skinning.
//!
//! Deforms bind-pose vertices with the current pose's skinning matrices:
//!
//! ```text
//! position = Σ wᵢ · Mᵢ · p
//! normal   = normalize(Σ wᵢ · (Mᵢ₃ₓ₃)⁻ᵀ · n)
//! ```
//!
//! Numeric edge cases never abort the pass:
//! - a vertex without influences is copied unchanged
//! - a bone index past the matrix array reads as identity
//! - a near-singular upper 3x3 uses the plain matrix for normals
//! - a weight sum off 1 beyond tolerance renormalizes the blend
//! - a zero-length blended normal becomes unit Z
//!
//! The skinner owns no GPU resources. It fills a [`VertexWriteTarget`] on
//! request, and only while [`SkinningMode::Cpu`] is active.

use glam::{Mat3, Mat4, Vec3};

use crate::render::staging::VertexWriteTarget;
use crate::render::vertex::SkeletalVertex;
use crate::settings::{SkinningMode, SkinningSettings};
use crate::utils::math::{normal_matrix, normalize_or_z};

#[derive(Debug, Clone, Default)]
pub struct CpuSkinner {
    settings: SkinningSettings,
    // Per-bone scratch, reused across frames.
    normal_matrices: Vec<Mat3>,
    direction_matrices: Vec<Mat3>,
}

impl CpuSkinner {
    #[must_use]
    pub fn new(settings: SkinningSettings) -> Self {
        Self {
            settings,
            normal_matrices: Vec::new(),
            direction_matrices: Vec::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SkinningSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SkinningSettings) {
        self.settings = settings;
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.settings.mode == SkinningMode::Cpu
    }

    /// Skins `bind` into `out`, vertex for vertex.
    ///
    /// Writes `min(bind.len(), out.len())` vertices and returns that count.
    pub fn skin(&mut self, bind: &[SkeletalVertex], skinning: &[Mat4], out: &mut [SkeletalVertex]) -> usize {
        self.prepare(skinning);

        let count = bind.len().min(out.len());
        for (src, dst) in bind.iter().zip(out.iter_mut()) {
            *dst = self.skin_vertex(src, skinning);
        }
        count
    }

    /// Skins into a write target and commits it.
    ///
    /// Returns `false` without touching the target when GPU skinning is
    /// active or the target size does not match the bind-pose vertex count.
    pub fn skin_into<T: VertexWriteTarget + ?Sized>(
        &mut self,
        bind: &[SkeletalVertex],
        skinning: &[Mat4],
        target: &mut T,
    ) -> bool {
        if !self.is_active() {
            return false;
        }
        if target.vertex_count() != bind.len() {
            log::warn!(
                "CPU skinning skipped: target holds {} vertices, bind pose has {}",
                target.vertex_count(),
                bind.len()
            );
            return false;
        }

        let region = target.begin_write();
        self.skin(bind, skinning, region);
        target.commit();
        true
    }

    fn prepare(&mut self, skinning: &[Mat4]) {
        let eps = self.settings.singular_determinant_epsilon;
        self.normal_matrices.clear();
        self.normal_matrices.extend(skinning.iter().map(|m| normal_matrix(m, eps)));
        self.direction_matrices.clear();
        self.direction_matrices.extend(skinning.iter().map(|m| Mat3::from_mat4(*m)));
    }

    fn skin_vertex(&self, vertex: &SkeletalVertex, skinning: &[Mat4]) -> SkeletalVertex {
        let mut out = *vertex;
        if vertex.influence_count() == 0 {
            return out;
        }

        let bind_position = vertex.position();
        let bind_normal = vertex.normal();
        let bind_tangent = vertex.tangent();

        let mut position = Vec3::ZERO;
        let mut normal = Vec3::ZERO;
        let mut tangent = Vec3::ZERO;
        let mut total = 0.0_f32;

        for (bone, weight) in vertex.influences() {
            match skinning.get(bone) {
                Some(m) => {
                    position += m.transform_point3(bind_position) * weight;
                    normal += (self.normal_matrices[bone] * bind_normal) * weight;
                    tangent += (self.direction_matrices[bone] * bind_tangent.truncate()) * weight;
                }
                None => {
                    position += bind_position * weight;
                    normal += bind_normal * weight;
                    tangent += bind_tangent.truncate() * weight;
                }
            }
            total += weight;
        }

        if (total - 1.0).abs() > self.settings.weight_tolerance && total > 0.0 {
            position /= total;
        }

        out.set_position(position);
        out.set_normal(normalize_or_z(normal));
        if self.settings.skin_tangents {
            let t = tangent.try_normalize().unwrap_or(bind_tangent.truncate());
            out.set_tangent(t.extend(bind_tangent.w));
        }
        out
    }
}
