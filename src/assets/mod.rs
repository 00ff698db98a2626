//! Asset pipeline: raw scene data in, meshes and skeletons out, with a
//! binary cache to skip the conversion next time.

pub mod cache;
pub mod importer;
pub mod materials;
pub mod scene_data;
pub mod storage;

pub use cache::{CacheReader, CacheSerialize, CacheWriter, load_from_path, save_to_path};
pub use importer::{ImportConverter, Influences, normalize_influences};
pub use materials::{MaterialHandle, MaterialProvider, MaterialRegistry, MaterialSlot, resolve_materials};
pub use scene_data::{
    BindPoseEntry, InMemorySource, LayerElement, MappingMode, MaterialMapping, MeshData, NodeKind, Polygon,
    ReferenceMode, SceneData, SceneNode, SceneSource, SkinCluster,
};
pub use storage::AssetStorage;
