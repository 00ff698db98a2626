use slotmap::new_key_type;

use crate::assets::storage::AssetStorage;
use crate::resources::mesh::MeshGeometry;

new_key_type! {
    /// Opaque material reference, used only for subset bookkeeping.
    pub struct MaterialHandle;
}

/// The core never reads material content; a slot only remembers its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialSlot {
    pub name: String,
}

/// Asset/material system seam: `(material index, name)` in, handle out.
pub trait MaterialProvider {
    fn resolve(&mut self, index: usize, name: &str) -> MaterialHandle;
}

/// Default provider, deduplicating materials by name.
#[derive(Default)]
pub struct MaterialRegistry {
    storage: AssetStorage<MaterialHandle, MaterialSlot>,
}

impl MaterialRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    #[must_use]
    pub fn handle_by_name(&self, name: &str) -> Option<MaterialHandle> {
        self.storage.handle_by_name(name)
    }

    #[must_use]
    pub fn name_of(&self, handle: MaterialHandle) -> Option<String> {
        self.storage.get(handle).map(|slot| slot.name.clone())
    }
}

impl MaterialProvider for MaterialRegistry {
    fn resolve(&mut self, _index: usize, name: &str) -> MaterialHandle {
        self.storage.add_named(name, MaterialSlot { name: name.to_string() })
    }
}

/// Resolves one handle per material slot of `geometry`.
///
/// A mesh without material names still gets one default slot so subset
/// index 0 always resolves.
pub fn resolve_materials<P: MaterialProvider + ?Sized>(
    geometry: &MeshGeometry,
    provider: &mut P,
) -> Vec<MaterialHandle> {
    if geometry.material_names.is_empty() {
        return vec![provider.resolve(0, "default")];
    }
    geometry
        .material_names
        .iter()
        .enumerate()
        .map(|(index, name)| provider.resolve(index, name))
        .collect()
}
