//! Core resource definitions, independent of any GPU implementation:
//! - Mesh: static/skinned mesh assets and material subsets
//! - Geometry: bounding volumes
//! - Buffer: shared, versioned CPU data buffers

pub mod buffer;
pub mod geometry;
pub mod mesh;

pub use buffer::{BufferRef, BufferUsage};
pub use geometry::BoundingBox;
pub use mesh::{MaterialSubset, MeshAsset, MeshBuffers, MeshGeometry, SkinnedMesh, StaticMesh};
