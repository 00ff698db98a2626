//! Bone hierarchy and pose cache.
//!
//! - [`Skeleton`]: flat bone arena, bind poses, cached processing order
//! - [`AnimationPoseData`]: per-instance local/global/skinning matrices with dirty bits
//! - [`Transform`]: TRS helper used when sampling

pub mod pose;
pub mod skeleton;
pub mod transform;

pub use pose::{AnimationPoseData, DirtyBits};
pub use skeleton::{BoneNode, PoseMut, PoseTarget, ReferenceSkeleton, Skeleton};
pub use transform::Transform;
