//! Raw scene data as an external reader hands it to the importer.
//!
//! The layout mirrors interchange formats that store geometry per control
//! point and attach per-corner attributes through layer elements with a
//! mapping mode and a reference mode. Nothing here is validated; the
//! [`ImportConverter`](super::importer::ImportConverter) does that.

use std::path::Path;

use glam::{Mat4, Vec2, Vec3, Vec4};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    #[default]
    Null,
    Bone,
    Mesh,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<usize>,
    pub kind: NodeKind,
    /// Node transform in scene space at bind time.
    pub global_transform: Mat4,
}

impl SceneNode {
    #[must_use]
    pub fn new(name: &str, parent: Option<usize>, kind: NodeKind, global_transform: Mat4) -> Self {
        Self {
            name: name.to_string(),
            parent,
            kind,
            global_transform,
        }
    }
}

/// How a layer element's entries map onto the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappingMode {
    #[default]
    ByControlPoint,
    ByPolygonVertex,
    ByPolygon,
    AllSame,
}

/// Whether entries are read directly or through an index array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceMode {
    #[default]
    Direct,
    IndexToDirect,
}

/// One per-corner attribute channel (normals, uvs, colors).
#[derive(Debug, Clone, PartialEq)]
pub struct LayerElement<T> {
    pub mapping: MappingMode,
    pub reference: ReferenceMode,
    pub direct: Vec<T>,
    pub indices: Vec<u32>,
}

impl<T: Copy> LayerElement<T> {
    #[must_use]
    pub fn direct(mapping: MappingMode, direct: Vec<T>) -> Self {
        Self {
            mapping,
            reference: ReferenceMode::Direct,
            direct,
            indices: Vec::new(),
        }
    }

    #[must_use]
    pub fn indexed(mapping: MappingMode, direct: Vec<T>, indices: Vec<u32>) -> Self {
        Self {
            mapping,
            reference: ReferenceMode::IndexToDirect,
            direct,
            indices,
        }
    }

    /// Value for one polygon corner.
    ///
    /// `corner` is the running polygon-vertex counter across the whole mesh.
    /// Returns `None` when the element does not cover the requested entry.
    #[must_use]
    pub fn resolve(&self, control_point: usize, polygon: usize, corner: usize) -> Option<T> {
        let slot = match self.mapping {
            MappingMode::ByControlPoint => control_point,
            MappingMode::ByPolygonVertex => corner,
            MappingMode::ByPolygon => polygon,
            MappingMode::AllSame => 0,
        };
        let direct_index = match self.reference {
            ReferenceMode::Direct => slot,
            ReferenceMode::IndexToDirect => *self.indices.get(slot)? as usize,
        };
        self.direct.get(direct_index).copied()
    }
}

/// Polygon as a list of control-point indices.
pub type Polygon = SmallVec<[u32; 4]>;

/// Per-polygon or per-mesh material assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialMapping {
    /// Only `ByPolygon` and `AllSame` are meaningful.
    pub mapping: MappingMode,
    pub indices: Vec<u32>,
}

impl MaterialMapping {
    #[must_use]
    pub fn material_for(&self, polygon: usize) -> Option<u32> {
        match self.mapping {
            MappingMode::AllSame => self.indices.first().copied(),
            MappingMode::ByPolygon => self.indices.get(polygon).copied(),
            MappingMode::ByControlPoint | MappingMode::ByPolygonVertex => None,
        }
    }
}

/// One bone's influence region over a mesh's control points.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinCluster {
    /// Scene node index of the bone.
    pub bone_node: usize,
    pub control_point_indices: Vec<u32>,
    pub weights: Vec<f32>,
    /// Mesh transform at bind time.
    pub transform_matrix: Mat4,
    /// Bone global transform at bind time.
    pub transform_link_matrix: Mat4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub name: String,
    /// Scene node index carrying this mesh.
    pub node: usize,
    pub control_points: Vec<Vec3>,
    pub polygons: Vec<Polygon>,
    pub normals: Option<LayerElement<Vec3>>,
    pub tangents: Option<LayerElement<Vec4>>,
    pub uvs: Option<LayerElement<Vec2>>,
    pub colors: Option<LayerElement<Vec4>>,
    pub material_mapping: Option<MaterialMapping>,
    pub material_names: Vec<String>,
    /// Pivot offset applied to the geometry only, not to child nodes.
    pub geometric_transform: Mat4,
    pub clusters: Vec<SkinCluster>,
}

impl MeshData {
    #[must_use]
    pub fn new(name: &str, node: usize, control_points: Vec<Vec3>, polygons: Vec<Polygon>) -> Self {
        Self {
            name: name.to_string(),
            node,
            control_points,
            polygons,
            normals: None,
            tangents: None,
            uvs: None,
            colors: None,
            material_mapping: None,
            material_names: Vec::new(),
            geometric_transform: Mat4::IDENTITY,
            clusters: Vec::new(),
        }
    }

    #[must_use]
    pub fn corner_count(&self) -> usize {
        self.polygons.iter().map(SmallVec::len).sum()
    }
}

/// Explicit bind pose entry for a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindPoseEntry {
    pub node: usize,
    pub matrix: Mat4,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneData {
    pub name: String,
    pub nodes: Vec<SceneNode>,
    pub meshes: Vec<MeshData>,
    pub bind_poses: Vec<BindPoseEntry>,
}

impl SceneData {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Appends a node and returns its index.
    pub fn add_node(&mut self, name: &str, parent: Option<usize>, kind: NodeKind, global_transform: Mat4) -> usize {
        self.nodes.push(SceneNode::new(name, parent, kind, global_transform));
        self.nodes.len() - 1
    }

    #[must_use]
    pub fn bind_pose_for(&self, node: usize) -> Option<Mat4> {
        self.bind_poses.iter().find(|e| e.node == node).map(|e| e.matrix)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.meshes.is_empty()
    }
}

/// External scene reader.
///
/// Failing to open or parse a file is reported as `None`: the core treats it
/// as absent input rather than its own error.
pub trait SceneSource {
    fn load(&self, path: &Path) -> Option<SceneData>;
}

/// A source serving one already-built scene, regardless of path.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    pub scene: Option<SceneData>,
}

impl SceneSource for InMemorySource {
    fn load(&self, _path: &Path) -> Option<SceneData> {
        self.scene.clone()
    }
}
