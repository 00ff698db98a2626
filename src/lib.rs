#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Skeletal animation core: bone hierarchy and pose cache, scene import,
//! keyframe sampling, CPU skinning and a binary asset cache.

pub mod animation;
pub mod assets;
pub mod engine;
pub mod errors;
pub mod render;
pub mod resources;
pub mod scene;
pub mod settings;
pub mod utils;

pub use animation::{
    AnimationAction, AnimationClip, AnimationLibrary, AnimationSampler, BoneAnimationTrack, ClipBinding, LoopMode,
};
pub use assets::{ImportConverter, MaterialRegistry, SceneData, SceneSource};
pub use engine::{SimulationContext, SkinnedMeshInstance, TickReport};
pub use errors::{Result, SinewError};
pub use render::{CpuSkinner, SkeletalVertex, StagingVertexBuffer};
pub use resources::{BoundingBox, MaterialSubset, MeshAsset, MeshGeometry, SkinnedMesh, StaticMesh};
pub use scene::{AnimationPoseData, BoneNode, PoseTarget, Skeleton, Transform};
pub use settings::{EngineSettings, ImportSettings, SkinningMode, SkinningSettings};
