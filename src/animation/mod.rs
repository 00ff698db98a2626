pub mod action;
pub mod binding;
pub mod clip;
pub mod sampler;
pub mod tracks;
pub mod values;

pub use action::{AnimationAction, LoopMode};
pub use binding::ClipBinding;
pub use clip::{AnimationClip, AnimationLibrary};
pub use sampler::AnimationSampler;
pub use tracks::{BoneAnimationTrack, KeyPair};
pub use values::Interpolatable;
