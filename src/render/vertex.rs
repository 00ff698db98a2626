use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Upper bound on bone influences per vertex.
pub const MAX_BONE_INFLUENCES: usize = 4;

/// Interleaved vertex as the renderer's input layout expects it.
///
/// Field order is part of the renderer contract: position, color, normal,
/// tangent, uv, material index, bone indices, bone weights. Unused influence
/// slots hold bone 0 with weight 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SkeletalVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub normal: [f32; 3],
    pub tangent: [f32; 4],
    pub uv: [f32; 2],
    pub material_index: u32,
    pub bone_indices: [u32; MAX_BONE_INFLUENCES],
    pub bone_weights: [f32; MAX_BONE_INFLUENCES],
}

impl Default for SkeletalVertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            color: [1.0; 4],
            normal: [0.0, 0.0, 1.0],
            tangent: [1.0, 0.0, 0.0, 1.0],
            uv: [0.0; 2],
            material_index: 0,
            bone_indices: [0; MAX_BONE_INFLUENCES],
            bone_weights: [0.0; MAX_BONE_INFLUENCES],
        }
    }
}

impl SkeletalVertex {
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[inline]
    #[must_use]
    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }

    #[inline]
    #[must_use]
    pub fn tangent(&self) -> Vec4 {
        Vec4::from_array(self.tangent)
    }

    #[inline]
    #[must_use]
    pub fn uv(&self) -> Vec2 {
        Vec2::from_array(self.uv)
    }

    #[inline]
    pub fn set_position(&mut self, p: Vec3) {
        self.position = p.to_array();
    }

    #[inline]
    pub fn set_normal(&mut self, n: Vec3) {
        self.normal = n.to_array();
    }

    #[inline]
    pub fn set_tangent(&mut self, t: Vec4) {
        self.tangent = t.to_array();
    }

    /// Non-zero `(bone, weight)` pairs.
    pub fn influences(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.bone_indices
            .iter()
            .zip(&self.bone_weights)
            .filter(|(_, w)| **w > 0.0)
            .map(|(&b, &w)| (b as usize, w))
    }

    #[must_use]
    pub fn influence_count(&self) -> usize {
        self.bone_weights.iter().filter(|w| **w > 0.0).count()
    }

    #[must_use]
    pub fn weight_sum(&self) -> f32 {
        self.bone_weights.iter().sum()
    }

    /// Byte layout handed to the renderer.
    #[must_use]
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: size_of::<Self>(),
            attributes: vec![
                VertexAttributeDesc::new("position", VertexFormat::Float32x3, offset_of!(Self, position)),
                VertexAttributeDesc::new("color", VertexFormat::Float32x4, offset_of!(Self, color)),
                VertexAttributeDesc::new("normal", VertexFormat::Float32x3, offset_of!(Self, normal)),
                VertexAttributeDesc::new("tangent", VertexFormat::Float32x4, offset_of!(Self, tangent)),
                VertexAttributeDesc::new("uv", VertexFormat::Float32x2, offset_of!(Self, uv)),
                VertexAttributeDesc::new("material_index", VertexFormat::Uint32, offset_of!(Self, material_index)),
                VertexAttributeDesc::new("joints", VertexFormat::Uint32x4, offset_of!(Self, bone_indices)),
                VertexAttributeDesc::new("weights", VertexFormat::Float32x4, offset_of!(Self, bone_weights)),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x4,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttributeDesc {
    pub name: &'static str,
    pub format: VertexFormat,
    pub offset: usize,
}

impl VertexAttributeDesc {
    const fn new(name: &'static str, format: VertexFormat, offset: usize) -> Self {
        Self { name, format, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: usize,
    pub attributes: Vec<VertexAttributeDesc>,
}
