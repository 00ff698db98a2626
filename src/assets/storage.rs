use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use slotmap::{Key, SlotMap};
use std::sync::Arc;

// Internal data structure, protected by a lock.
struct StorageInner<H: Key, T> {
    map: SlotMap<H, Arc<T>>,
    lookup: FxHashMap<String, H>,
}

impl<H: Key, T> Default for StorageInner<H, T> {
    fn default() -> Self {
        Self {
            map: SlotMap::default(),
            lookup: FxHashMap::default(),
        }
    }
}

/// Thread-safe handle-keyed asset container with an optional name index.
pub struct AssetStorage<H: Key, T> {
    inner: RwLock<StorageInner<H, T>>,
}

impl<H: Key, T> Default for AssetStorage<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Key, T> AssetStorage<H, T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::default(),
        }
    }

    /// [Write] Adds an asset under a name; an existing name returns the
    /// handle already stored and drops `asset`.
    pub fn add_named(&self, name: &str, asset: impl Into<T>) -> H {
        let mut guard = self.inner.write();
        if let Some(&handle) = guard.lookup.get(name) {
            return handle;
        }
        let handle = guard.map.insert(Arc::new(asset.into()));
        guard.lookup.insert(name.to_string(), handle);
        handle
    }

    /// [Read] Gets a single asset.
    pub fn get(&self, handle: H) -> Option<Arc<T>> {
        let guard = self.inner.read();
        guard.map.get(handle).cloned()
    }

    pub fn handle_by_name(&self, name: &str) -> Option<H> {
        let guard = self.inner.read();
        guard.lookup.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().map.is_empty()
    }
}
