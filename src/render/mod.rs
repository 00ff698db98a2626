//! CPU-side render contract.
//!
//! - [`vertex`]: the interleaved vertex layout the renderer consumes
//! - [`staging`]: the double-buffered write target handed to the renderer
//! - [`skinning`]: the CPU skinning engine filling that target

pub mod skinning;
pub mod staging;
pub mod vertex;

pub use skinning::CpuSkinner;
pub use staging::{StagingVertexBuffer, VertexWriteTarget};
pub use vertex::{MAX_BONE_INFLUENCES, SkeletalVertex, VertexAttributeDesc, VertexFormat, VertexLayout};
