use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use bytemuck::Pod;
use parking_lot::{RwLock, RwLockReadGuard};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

bitflags! {
    /// How the renderer will consume a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        /// Rewritten by the CPU every frame (skinned output).
        const DYNAMIC = 1 << 2;
    }
}

/// CPU-side copy of a renderer buffer.
///
/// The renderer uploads whenever `version` has moved since its last upload.
#[derive(Debug)]
pub struct DataBuffer {
    pub id: u64,
    pub label: String,
    version: AtomicU64,
    data: RwLock<Vec<u8>>,
    pub usage: BufferUsage,
}

impl Drop for DataBuffer {
    fn drop(&mut self) {
        log::trace!("Releasing buffer '{}' (id {})", self.label, self.id);
    }
}

/// Shared handle to a [`DataBuffer`].
///
/// A mesh asset holds the only long-lived handle to its buffers; the data is
/// released exactly once, when the last handle drops.
#[derive(Debug, Clone)]
pub struct BufferRef(Arc<DataBuffer>);

impl PartialEq for BufferRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for BufferRef {}

impl std::hash::Hash for BufferRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl BufferRef {
    pub fn new<T: Pod>(data: &[T], usage: BufferUsage, label: Option<&str>) -> Self {
        Self::from_bytes(bytemuck::cast_slice(data), usage, label)
    }

    pub fn from_bytes(data: &[u8], usage: BufferUsage, label: Option<&str>) -> Self {
        Self(Arc::new(DataBuffer {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            label: label.unwrap_or("Buffer").to_string(),
            version: AtomicU64::new(0),
            data: RwLock::new(data.to_vec()),
            usage,
        }))
    }

    pub fn version(&self) -> u64 {
        self.0.version.load(Ordering::Acquire)
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn usage(&self) -> BufferUsage {
        self.0.usage
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }

    pub fn len_bytes(&self) -> usize {
        self.0.data.read().len()
    }

    /// Replaces the contents and bumps the version.
    pub fn update<T: Pod>(&self, data: &[T]) {
        {
            let mut inner = self.0.data.write();
            inner.clear();
            inner.extend_from_slice(bytemuck::cast_slice(data));
        }
        self.0.version.fetch_add(1, Ordering::Release);
    }

    pub fn read_data(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.0.data.read()
    }

    /// Number of live handles (the owning asset plus any renderer references).
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}
