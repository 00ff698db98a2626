//! Import converter.
//!
//! Turns a [`SceneData`] graph into a [`MeshAsset`]:
//!
//! 1. Bone collection and parent-first ordering
//! 2. Per-control-point influence accumulation across all meshes
//! 3. Weight normalization (at most four influences, exact unit sum)
//! 4. Vertex deduplication over every vertex field, fan triangulation
//! 5. Material subsets
//! 6. Bind-pose bounds, hierarchy finalize and one full pose update
//!
//! Malformed input aborts the whole import with an error; partial state is
//! dropped with the converter's locals.

use std::collections::VecDeque;
use std::mem::size_of;
use std::path::Path;

use glam::{Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::assets::scene_data::{MappingMode, MeshData, NodeKind, SceneData, SceneSource};
use crate::errors::{Result, SinewError};
use crate::render::vertex::{MAX_BONE_INFLUENCES, SkeletalVertex};
use crate::resources::geometry::BoundingBox;
use crate::resources::mesh::{MaterialSubset, MeshAsset, MeshGeometry, SkinnedMesh, StaticMesh};
use crate::scene::Skeleton;
use crate::settings::ImportSettings;
use crate::utils::math::{normal_matrix, normalize_or_z};

/// Raw influences of one control point before normalization.
type RawInfluences = SmallVec<[(u32, f32); 8]>;

/// Bit pattern of a whole vertex; equal keys mean identical vertices.
type VertexKey = [u32; size_of::<SkeletalVertex>() / 4];

/// Normalized influence slots of one control point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Influences {
    pub bones: [u32; MAX_BONE_INFLUENCES],
    pub weights: [f32; MAX_BONE_INFLUENCES],
}

impl Influences {
    #[must_use]
    pub fn count(&self) -> usize {
        self.weights.iter().filter(|&&w| w > 0.0).count()
    }
}

/// Drops non-positive (or `<= epsilon`) weights, merges repeated bones, sorts
/// descending, keeps `max_influences` and rescales so the kept weights sum to
/// exactly 1. The last kept weight is `1 - sum(others)`.
#[must_use]
pub fn normalize_influences(raw: &[(u32, f32)], max_influences: usize, epsilon: f32) -> Influences {
    let mut merged: SmallVec<[(u32, f32); 8]> = SmallVec::new();
    for &(bone, weight) in raw {
        if !weight.is_finite() || weight <= epsilon.max(0.0) {
            continue;
        }
        match merged.iter_mut().find(|(b, _)| *b == bone) {
            Some((_, w)) => *w += weight,
            None => merged.push((bone, weight)),
        }
    }

    merged.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    merged.truncate(max_influences.clamp(1, MAX_BONE_INFLUENCES));

    let mut out = Influences::default();
    let total: f32 = merged.iter().map(|(_, w)| w).sum();
    if merged.is_empty() || total <= 0.0 {
        return out;
    }

    let last = merged.len() - 1;
    let mut others = 0.0;
    for (slot, &(bone, weight)) in merged.iter().enumerate() {
        out.bones[slot] = bone;
        if slot < last {
            out.weights[slot] = weight / total;
            others += out.weights[slot];
        }
    }
    out.weights[last] = (1.0 - others).max(0.0);
    out
}

#[derive(Debug, Clone, Default)]
pub struct ImportConverter {
    settings: ImportSettings,
}

impl ImportConverter {
    #[must_use]
    pub fn new(settings: ImportSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Loads through an external reader and converts.
    ///
    /// `Ok(None)` means the reader produced nothing for `path`.
    pub fn import<S: SceneSource + ?Sized>(&self, source: &S, path: &Path) -> Result<Option<MeshAsset>> {
        let Some(scene) = source.load(path) else {
            log::warn!("Scene reader produced no data for {}", path.display());
            return Ok(None);
        };
        self.convert(&scene).map(Some)
    }

    pub fn convert(&self, scene: &SceneData) -> Result<MeshAsset> {
        validate(scene)?;

        let bones = collect_bones(scene)?;
        let mut skeleton = Skeleton::new(&scene.name);
        for bone in &bones.ordered {
            skeleton.add_bone(&bone.name, bone.parent, bone.global_bind, bone.geometry_offset);
        }

        let influences = self.accumulate_influences(scene, &bones.node_to_bone);
        let mut builder = GeometryBuilder::new(self.settings.deduplicate_vertices);
        let mut control_point_offset = 0;
        for mesh in &scene.meshes {
            self.append_mesh(
                &mut builder,
                mesh,
                &influences[control_point_offset..control_point_offset + mesh.control_points.len()],
                bones.ordered.is_empty(),
            );
            control_point_offset += mesh.control_points.len();
        }

        if builder.triangles.is_empty() {
            let name = scene.meshes.first().map(|m| m.name.clone()).unwrap_or_default();
            return Err(SinewError::NoPolygons { mesh: name });
        }

        let name = if scene.meshes.len() == 1 {
            scene.meshes[0].name.clone()
        } else {
            scene.name.clone()
        };
        let mut geometry = builder.finish(name);

        if bones.ordered.is_empty() {
            geometry.bounds = BoundingBox::from_points(geometry.vertices.iter().map(SkeletalVertex::position));
            log::info!(
                "Imported static mesh '{}': {} vertices, {} triangles, {} subsets",
                geometry.name,
                geometry.vertex_count(),
                geometry.triangle_count(),
                geometry.subsets.len()
            );
            return Ok(MeshAsset::Static(StaticMesh::new(geometry)));
        }

        geometry.bounds = skinned_bind_bounds(&geometry.vertices, &skeleton);
        skeleton.finalize_bone_hierarchy()?;
        skeleton.update_world_transforms();

        log::info!(
            "Imported skinned mesh '{}': {} bones, {} vertices, {} triangles, {} subsets",
            geometry.name,
            skeleton.bone_count(),
            geometry.vertex_count(),
            geometry.triangle_count(),
            geometry.subsets.len()
        );
        Ok(MeshAsset::Skinned(SkinnedMesh::new(geometry, skeleton)))
    }

    // ========================================================================
    // Influences
    // ========================================================================

    fn accumulate_influences(&self, scene: &SceneData, node_to_bone: &FxHashMap<usize, u32>) -> Vec<Influences> {
        let total: usize = scene.meshes.iter().map(|m| m.control_points.len()).sum();
        let mut raw: Vec<RawInfluences> = vec![RawInfluences::new(); total];

        let mut offset = 0;
        for mesh in &scene.meshes {
            let count = mesh.control_points.len();
            let mut skipped = 0usize;
            for cluster in &mesh.clusters {
                let Some(&bone) = node_to_bone.get(&cluster.bone_node) else {
                    continue;
                };
                for (&cp, &weight) in cluster.control_point_indices.iter().zip(&cluster.weights) {
                    let cp = cp as usize;
                    if cp >= count {
                        skipped += 1;
                        continue;
                    }
                    raw[offset + cp].push((bone, weight));
                }
            }
            if skipped > 0 {
                log::warn!("Mesh '{}': {skipped} cluster entries reference missing control points", mesh.name);
            }
            offset += count;
        }

        let max = self.settings.effective_max_influences();
        raw.iter()
            .map(|list| normalize_influences(list, max, self.settings.weight_epsilon))
            .collect()
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    fn append_mesh(&self, builder: &mut GeometryBuilder, mesh: &MeshData, influences: &[Influences], bake_transform: bool) {
        let material_map = builder.register_materials(&mesh.material_names);
        let material_count = material_map.len().max(1);

        let mapping = mesh.material_mapping.as_ref().filter(|m| {
            let consistent = match m.mapping {
                MappingMode::ByPolygon => m.indices.len() == mesh.polygons.len(),
                MappingMode::AllSame => !m.indices.is_empty(),
                MappingMode::ByControlPoint | MappingMode::ByPolygonVertex => false,
            };
            if !consistent {
                log::warn!("Mesh '{}': material mapping is inconsistent, using a single material", mesh.name);
            }
            consistent
        });

        // Weighted vertices reach the pivot offset through their bones' geometry
        // offsets. Static meshes and unweighted vertices carry it themselves.
        let geometric = mesh.geometric_transform;
        let geometric_normals = normal_matrix(&geometric, 1e-8);

        let mut corner = 0usize;
        let mut degenerate = 0usize;
        for (polygon_index, polygon) in mesh.polygons.iter().enumerate() {
            let corners = polygon.len();
            if corners < 3 {
                degenerate += 1;
                corner += corners;
                continue;
            }

            let local_material = mapping.and_then(|m| m.material_for(polygon_index)).unwrap_or(0) as usize;
            let material = if local_material < material_count {
                material_map.get(local_material).copied().unwrap_or(0)
            } else {
                log::warn!("Mesh '{}': polygon {polygon_index} uses material {local_material}, reading material 0", mesh.name);
                material_map.first().copied().unwrap_or(0)
            };

            let fallback_normal = if self.settings.compute_missing_normals {
                face_normal(mesh, polygon)
            } else {
                Vec3::Z
            };

            let mut ring: SmallVec<[u32; 8]> = SmallVec::with_capacity(corners);
            for &cp in polygon {
                let cp = cp as usize;
                let mut vertex = SkeletalVertex::default();

                let inf = influences[cp];
                let mut position = mesh.control_points[cp];
                let mut normal = mesh
                    .normals
                    .as_ref()
                    .and_then(|layer| layer.resolve(cp, polygon_index, corner))
                    .unwrap_or(fallback_normal);
                if bake_transform || inf.count() == 0 {
                    position = geometric.transform_point3(position);
                    normal = geometric_normals * normal;
                }
                vertex.set_position(position);
                vertex.set_normal(normalize_or_z(normal));

                if let Some(t) = mesh.tangents.as_ref().and_then(|l| l.resolve(cp, polygon_index, corner)) {
                    vertex.set_tangent(t);
                }
                let uv = mesh
                    .uvs
                    .as_ref()
                    .and_then(|l| l.resolve(cp, polygon_index, corner))
                    .unwrap_or(Vec2::ZERO);
                vertex.uv = uv.to_array();
                let color = mesh
                    .colors
                    .as_ref()
                    .and_then(|l| l.resolve(cp, polygon_index, corner))
                    .unwrap_or(Vec4::ONE);
                vertex.color = color.to_array();
                vertex.material_index = material;

                vertex.bone_indices = inf.bones;
                vertex.bone_weights = inf.weights;

                ring.push(builder.push_vertex(vertex));
                corner += 1;
            }

            for i in 1..corners - 1 {
                builder.triangles.push((material, [ring[0], ring[i], ring[i + 1]]));
            }
        }

        if degenerate > 0 {
            log::warn!("Mesh '{}': skipped {degenerate} polygons with fewer than 3 corners", mesh.name);
        }
        log::debug!(
            "Mesh '{}': {} control points, {} polygons, {} corners",
            mesh.name,
            mesh.control_points.len(),
            mesh.polygons.len(),
            corner
        );
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate(scene: &SceneData) -> Result<()> {
    if scene.meshes.is_empty() {
        return Err(SinewError::EmptyScene);
    }

    let node_count = scene.nodes.len();
    for (index, node) in scene.nodes.iter().enumerate() {
        if let Some(parent) = node.parent
            && parent >= node_count
        {
            return Err(SinewError::InvalidNodeReference {
                context: format!("parent of node '{}' (node {index})", node.name),
                index: parent,
            });
        }
    }

    for mesh in &scene.meshes {
        if mesh.control_points.is_empty() {
            return Err(SinewError::NoControlPoints { mesh: mesh.name.clone() });
        }
        if mesh.polygons.is_empty() {
            return Err(SinewError::NoPolygons { mesh: mesh.name.clone() });
        }
        if mesh.node >= node_count {
            return Err(SinewError::InvalidNodeReference {
                context: format!("node of mesh '{}'", mesh.name),
                index: mesh.node,
            });
        }
        for cluster in &mesh.clusters {
            if cluster.bone_node >= node_count {
                return Err(SinewError::InvalidNodeReference {
                    context: format!("cluster bone of mesh '{}'", mesh.name),
                    index: cluster.bone_node,
                });
            }
        }
        let cp_count = mesh.control_points.len();
        for polygon in &mesh.polygons {
            if let Some(&bad) = polygon.iter().find(|&&cp| cp as usize >= cp_count) {
                return Err(SinewError::InvalidNodeReference {
                    context: format!("control point of mesh '{}'", mesh.name),
                    index: bad as usize,
                });
            }
        }
    }
    Ok(())
}

// ============================================================================
// Bones
// ============================================================================

struct ImportedBone {
    name: String,
    parent: Option<usize>,
    global_bind: Mat4,
    geometry_offset: Mat4,
}

struct CollectedBones {
    /// Parents before children.
    ordered: Vec<ImportedBone>,
    /// Scene node index -> skeleton bone index.
    node_to_bone: FxHashMap<usize, u32>,
}

fn collect_bones(scene: &SceneData) -> Result<CollectedBones> {
    let node_count = scene.nodes.len();

    // Cluster link nodes count as bones even when the reader tagged them otherwise.
    let mut is_bone: Vec<bool> = scene.nodes.iter().map(|n| n.kind == NodeKind::Bone).collect();
    for mesh in &scene.meshes {
        for cluster in &mesh.clusters {
            is_bone[cluster.bone_node] = true;
        }
    }

    // Nearest bone ancestor, skipping non-bone intermediates.
    let bone_parent = |node: usize| -> Option<usize> {
        let mut current = scene.nodes[node].parent;
        let mut steps = 0;
        while let Some(p) = current {
            if is_bone[p] {
                return Some(p);
            }
            steps += 1;
            if steps > node_count {
                return None;
            }
            current = scene.nodes[p].parent;
        }
        None
    };

    let bone_nodes: Vec<usize> = (0..node_count).filter(|&i| is_bone[i]).collect();
    let mut children: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    let mut queue = VecDeque::new();
    for &node in &bone_nodes {
        match bone_parent(node) {
            Some(parent) => children.entry(parent).or_default().push(node),
            None => queue.push_back(node),
        }
    }

    let mut node_to_bone: FxHashMap<usize, u32> = FxHashMap::default();
    let mut ordered = Vec::with_capacity(bone_nodes.len());
    while let Some(node) = queue.pop_front() {
        if node_to_bone.contains_key(&node) {
            continue;
        }
        let parent = bone_parent(node).and_then(|p| node_to_bone.get(&p)).map(|&b| b as usize);
        let (global_bind, geometry_offset) = bind_matrices(scene, node);
        node_to_bone.insert(node, ordered.len() as u32);
        ordered.push(ImportedBone {
            name: scene.nodes[node].name.clone(),
            parent,
            global_bind,
            geometry_offset,
        });
        if let Some(kids) = children.get(&node) {
            queue.extend(kids.iter().copied());
        }
    }

    if let Some(&unreached) = bone_nodes.iter().find(|n| !node_to_bone.contains_key(n)) {
        return Err(SinewError::CyclicBoneHierarchy {
            bone: scene.nodes[unreached].name.clone(),
        });
    }

    log::debug!("Collected {} bones from {} nodes", ordered.len(), node_count);
    Ok(CollectedBones { ordered, node_to_bone })
}

/// Global bind pose and geometry offset of a bone node.
///
/// The first cluster linked to the node wins; otherwise the explicit bind
/// pose, otherwise the node's own global transform with no offset.
fn bind_matrices(scene: &SceneData, node: usize) -> (Mat4, Mat4) {
    for mesh in &scene.meshes {
        if let Some(cluster) = mesh.clusters.iter().find(|c| c.bone_node == node) {
            return (
                cluster.transform_link_matrix,
                cluster.transform_matrix * mesh.geometric_transform,
            );
        }
    }
    let global = scene
        .bind_pose_for(node)
        .unwrap_or(scene.nodes[node].global_transform);
    (global, Mat4::IDENTITY)
}

// ============================================================================
// Output assembly
// ============================================================================

fn face_normal(mesh: &MeshData, polygon: &[u32]) -> Vec3 {
    // Newell's method, stable for non-planar n-gons.
    let mut n = Vec3::ZERO;
    for (i, &a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        let p = mesh.control_points[a as usize];
        let q = mesh.control_points[b as usize];
        n.x += (p.y - q.y) * (p.z + q.z);
        n.y += (p.z - q.z) * (p.x + q.x);
        n.z += (p.x - q.x) * (p.y + q.y);
    }
    normalize_or_z(n)
}

/// Bounds of the bind-pose vertex positions as skinning produces them: each
/// weighted vertex goes through its bones' geometry offsets.
fn skinned_bind_bounds(vertices: &[SkeletalVertex], skeleton: &Skeleton) -> BoundingBox {
    BoundingBox::from_points(vertices.iter().map(|v| {
        let p = v.position();
        if v.influence_count() == 0 {
            return p;
        }
        v.influences()
            .map(|(bone, w)| {
                let offset = skeleton.bone(bone).map_or(Mat4::IDENTITY, |b| b.geometry_offset);
                offset.transform_point3(p) * w
            })
            .sum()
    }))
}

struct GeometryBuilder {
    deduplicate: bool,
    vertices: Vec<SkeletalVertex>,
    lookup: FxHashMap<VertexKey, u32>,
    triangles: Vec<(u32, [u32; 3])>,
    material_names: Vec<String>,
}

impl GeometryBuilder {
    fn new(deduplicate: bool) -> Self {
        Self {
            deduplicate,
            vertices: Vec::new(),
            lookup: FxHashMap::default(),
            triangles: Vec::new(),
            material_names: Vec::new(),
        }
    }

    /// Maps a mesh's local material slots onto the merged material list.
    fn register_materials(&mut self, names: &[String]) -> Vec<u32> {
        names
            .iter()
            .map(|name| match self.material_names.iter().position(|n| n == name) {
                Some(index) => index as u32,
                None => {
                    self.material_names.push(name.clone());
                    (self.material_names.len() - 1) as u32
                }
            })
            .collect()
    }

    fn push_vertex(&mut self, vertex: SkeletalVertex) -> u32 {
        if !self.deduplicate {
            self.vertices.push(vertex);
            return (self.vertices.len() - 1) as u32;
        }
        let key: VertexKey = bytemuck::cast(vertex);
        *self.lookup.entry(key).or_insert_with(|| {
            self.vertices.push(vertex);
            (self.vertices.len() - 1) as u32
        })
    }

    /// Buckets triangles by material into contiguous index runs.
    fn finish(self, name: String) -> MeshGeometry {
        let mut buckets: Vec<Vec<[u32; 3]>> = Vec::new();
        for &(material, triangle) in &self.triangles {
            let slot = material as usize;
            if buckets.len() <= slot {
                buckets.resize_with(slot + 1, Vec::new);
            }
            buckets[slot].push(triangle);
        }

        let mut indices = Vec::with_capacity(self.triangles.len() * 3);
        let mut subsets = Vec::new();
        for (material, triangles) in buckets.iter().enumerate() {
            if triangles.is_empty() {
                continue;
            }
            let start = indices.len() as u32;
            indices.extend(triangles.iter().flatten());
            subsets.push(MaterialSubset {
                material_index: material as u32,
                index_start: start,
                index_count: indices.len() as u32 - start,
            });
        }

        MeshGeometry {
            name,
            vertices: self.vertices,
            indices,
            subsets,
            material_names: self.material_names,
            bounds: BoundingBox::empty(),
        }
    }
}
