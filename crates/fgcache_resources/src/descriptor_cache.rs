//! Descriptor set cache
//!
//! Deduplicates compiled descriptor objects across binding tables.
//!
//! # Two-Level Lookup
//!
//! The **L1** cache is the table's own atomic cached handle: while it is
//! valid the table has not changed since the last compile and no hashing is
//! needed. On an L1 miss the **L2** map, keyed by the layout id and every slot
//! payload, is consulted; only an L2 miss calls the compile closure. Either
//! way the resulting id is written back into the table.
//!
//! Dynamic offsets are not part of the key, they are supplied at draw time.

use std::hash::{Hash, Hasher};

use fgcache_core::{HashVal, RawDescriptorSetLayoutId, RawPipelineResourcesId, Result};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::binding_table::{BindingTable, ResourcePayload};

/// Full-content key of a binding table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResourceSetKey {
    hash: HashVal,
    layout_id: RawDescriptorSetLayoutId,
    payloads: Box<[ResourcePayload]>,
}

impl ResourceSetKey {
    fn new(table: &BindingTable) -> Self {
        Self {
            hash: table.content_hash(),
            layout_id: table.layout_id(),
            payloads: table.slots().iter().map(|s| *s.payload()).collect(),
        }
    }
}

impl Hash for ResourceSetKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // slot hashes already cover the payloads
        state.write_u64(self.hash.get());
    }
}

/// Content-keyed cache of compiled descriptor objects.
#[derive(Debug, Default)]
pub struct DescriptorSetCache {
    lookup: Mutex<FxHashMap<ResourceSetKey, RawPipelineResourcesId>>,
}

impl DescriptorSetCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled descriptor object for the current content of
    /// `table`, compiling it with `create` when no equal table was seen.
    ///
    /// The lookup map stays locked while `create` runs, so two tables with
    /// equal content never compile twice.
    ///
    /// # Errors
    /// Returns the error of `create`; nothing is cached and the table keeps
    /// its invalid handle.
    pub fn get_or_create<F>(&self, table: &BindingTable, create: F) -> Result<RawPipelineResourcesId>
    where
        F: FnOnce(&BindingTable) -> Result<RawPipelineResourcesId>,
    {
        if let Some(id) = table.cached_handle() {
            return Ok(id);
        }

        let key = ResourceSetKey::new(table);
        let mut lookup = self.lookup.lock();
        let id = if let Some(&id) = lookup.get(&key) {
            id
        } else {
            let id = create(table)?;
            log::debug!("DescriptorSetCache: compiled {id:?} for layout {:?}", key.layout_id);
            lookup.insert(key, id);
            id
        };
        drop(lookup);

        table.set_cached_handle(id);
        Ok(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lookup.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lookup.lock().is_empty()
    }

    /// Forgets every entry and returns the ids the caller must destroy.
    ///
    /// Tables still holding one of these ids are not reset; callers clear
    /// them with [`BindingTable::reset_cached_handle`].
    pub fn clear(&self) -> Vec<RawPipelineResourcesId> {
        self.lookup.lock().drain().map(|(_, id)| id).collect()
    }
}
