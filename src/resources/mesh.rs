use bytemuck::{Pod, Zeroable};

use crate::render::vertex::SkeletalVertex;
use crate::resources::buffer::{BufferRef, BufferUsage};
use crate::resources::geometry::BoundingBox;
use crate::scene::{AnimationPoseData, Skeleton};

/// A contiguous index range drawn with one material.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct MaterialSubset {
    pub material_index: u32,
    pub index_start: u32,
    pub index_count: u32,
}

/// Deduplicated vertex/index data plus material bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub name: String,
    pub vertices: Vec<SkeletalVertex>,
    pub indices: Vec<u32>,
    pub subsets: Vec<MaterialSubset>,
    pub material_names: Vec<String>,
    pub bounds: BoundingBox,
}

impl MeshGeometry {
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Material name for an index; out-of-range indices read material 0.
    #[must_use]
    pub fn material_name(&self, index: usize) -> Option<&str> {
        self.material_names
            .get(index)
            .or_else(|| self.material_names.first())
            .map(String::as_str)
    }
}

/// Renderer buffers derived from a [`MeshGeometry`].
///
/// Owned exclusively by the mesh asset; dropping the asset releases them.
#[derive(Debug, Clone)]
pub struct MeshBuffers {
    pub vertex: BufferRef,
    pub index: BufferRef,
}

impl MeshBuffers {
    #[must_use]
    pub fn from_geometry(geometry: &MeshGeometry) -> Self {
        Self {
            vertex: BufferRef::new(
                &geometry.vertices,
                BufferUsage::VERTEX,
                Some(&format!("{}_Vertices", geometry.name)),
            ),
            index: BufferRef::new(
                &geometry.indices,
                BufferUsage::INDEX,
                Some(&format!("{}_Indices", geometry.name)),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StaticMesh {
    pub geometry: MeshGeometry,
    pub buffers: MeshBuffers,
}

impl StaticMesh {
    #[must_use]
    pub fn new(geometry: MeshGeometry) -> Self {
        let buffers = MeshBuffers::from_geometry(&geometry);
        Self { geometry, buffers }
    }
}

/// Bind-pose geometry with the skeleton that deforms it.
#[derive(Debug, Clone)]
pub struct SkinnedMesh {
    pub geometry: MeshGeometry,
    pub skeleton: Skeleton,
    pub buffers: MeshBuffers,
}

impl SkinnedMesh {
    #[must_use]
    pub fn new(geometry: MeshGeometry, skeleton: Skeleton) -> Self {
        let buffers = MeshBuffers::from_geometry(&geometry);
        Self {
            geometry,
            skeleton,
            buffers,
        }
    }

    #[inline]
    #[must_use]
    pub fn bind_vertices(&self) -> &[SkeletalVertex] {
        &self.geometry.vertices
    }

    /// A pose cache for one animated instance of this mesh.
    #[must_use]
    pub fn create_pose(&self) -> AnimationPoseData {
        let mut pose = self.skeleton.create_pose();
        self.skeleton.update_pose(&mut pose);
        pose
    }
}

/// Mesh variants the core distinguishes.
#[derive(Debug, Clone)]
pub enum MeshAsset {
    Static(StaticMesh),
    Skinned(SkinnedMesh),
}

impl MeshAsset {
    #[must_use]
    pub fn geometry(&self) -> &MeshGeometry {
        match self {
            MeshAsset::Static(m) => &m.geometry,
            MeshAsset::Skinned(m) => &m.geometry,
        }
    }

    #[must_use]
    pub fn buffers(&self) -> &MeshBuffers {
        match self {
            MeshAsset::Static(m) => &m.buffers,
            MeshAsset::Skinned(m) => &m.buffers,
        }
    }

    #[must_use]
    pub fn skeleton(&self) -> Option<&Skeleton> {
        match self {
            MeshAsset::Static(_) => None,
            MeshAsset::Skinned(m) => Some(&m.skeleton),
        }
    }

    #[must_use]
    pub fn as_skinned(&self) -> Option<&SkinnedMesh> {
        match self {
            MeshAsset::Skinned(m) => Some(m),
            MeshAsset::Static(_) => None,
        }
    }

    #[must_use]
    pub fn into_skinned(self) -> Option<SkinnedMesh> {
        match self {
            MeshAsset::Skinned(m) => Some(m),
            MeshAsset::Static(_) => None,
        }
    }

    #[must_use]
    pub fn is_skinned(&self) -> bool {
        matches!(self, MeshAsset::Skinned(_))
    }
}
