use crate::render::vertex::SkeletalVertex;
use crate::resources::buffer::{BufferRef, BufferUsage};

/// A CPU-visible region the skinner fills once per frame.
///
/// Writers call [`begin_write`](Self::begin_write), fill every vertex, then
/// [`commit`](Self::commit) to hand the result to the reader.
pub trait VertexWriteTarget {
    fn vertex_count(&self) -> usize;
    fn begin_write(&mut self) -> &mut [SkeletalVertex];
    fn commit(&mut self);
}

impl VertexWriteTarget for Vec<SkeletalVertex> {
    fn vertex_count(&self) -> usize {
        self.len()
    }

    fn begin_write(&mut self) -> &mut [SkeletalVertex] {
        self
    }

    fn commit(&mut self) {}
}

/// Double-buffered skinned vertex output.
///
/// The back buffer is private to the writer; `commit` copies it into the
/// shared [`BufferRef`] the renderer reads, bumping its version. One writer,
/// one reader, no shared mutation outside the commit.
#[derive(Debug)]
pub struct StagingVertexBuffer {
    back: Vec<SkeletalVertex>,
    front: BufferRef,
    commits: u64,
}

impl StagingVertexBuffer {
    /// Seeds both halves with `initial` (normally the bind pose).
    #[must_use]
    pub fn new(initial: &[SkeletalVertex], label: &str) -> Self {
        Self {
            back: initial.to_vec(),
            front: BufferRef::new(initial, BufferUsage::VERTEX | BufferUsage::DYNAMIC, Some(label)),
            commits: 0,
        }
    }

    /// The renderer-facing buffer.
    #[must_use]
    pub fn front(&self) -> &BufferRef {
        &self.front
    }

    /// Snapshot of the last committed vertices.
    #[must_use]
    pub fn front_vertices(&self) -> Vec<SkeletalVertex> {
        let data = self.front.read_data();
        bytemuck::pod_collect_to_vec::<u8, SkeletalVertex>(data.as_slice())
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.front.version()
    }

    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits
    }
}

impl VertexWriteTarget for StagingVertexBuffer {
    fn vertex_count(&self) -> usize {
        self.back.len()
    }

    fn begin_write(&mut self) -> &mut [SkeletalVertex] {
        &mut self.back
    }

    fn commit(&mut self) {
        self.front.update(&self.back);
        self.commits += 1;
    }
}
