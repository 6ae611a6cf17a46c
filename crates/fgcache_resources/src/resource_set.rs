//! Binding tables of one pipeline, keyed by descriptor set index.

use fgcache_core::config::MAX_DESCRIPTOR_SETS;
use fgcache_core::{DescriptorSetId, RawPipelineResourcesId};
use smallvec::SmallVec;

use crate::binding_table::BindingTable;

/// Up to [`MAX_DESCRIPTOR_SETS`] binding tables, kept sorted by set index.
///
/// Iteration and [`dynamic_offsets`](Self::dynamic_offsets) follow set order,
/// which is the order the offsets are consumed when the sets are bound.
#[derive(Debug, Default, Clone)]
pub struct PipelineResourceSet<'a> {
    sets: SmallVec<[(DescriptorSetId, &'a BindingTable); MAX_DESCRIPTOR_SETS]>,
}

impl<'a> PipelineResourceSet<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `table` at `set`, returning the table it replaces.
    ///
    /// # Panics
    /// Panics if `set` is out of range.
    pub fn insert(&mut self, set: DescriptorSetId, table: &'a BindingTable) -> Option<&'a BindingTable> {
        assert!(
            (set.0 as usize) < MAX_DESCRIPTOR_SETS,
            "PipelineResourceSet: descriptor set {} out of range (max {MAX_DESCRIPTOR_SETS})",
            set.0
        );
        match self.sets.binary_search_by_key(&set, |(id, _)| *id) {
            Ok(pos) => Some(std::mem::replace(&mut self.sets[pos].1, table)),
            Err(pos) => {
                self.sets.insert(pos, (set, table));
                None
            }
        }
    }

    pub fn remove(&mut self, set: DescriptorSetId) -> Option<&'a BindingTable> {
        let pos = self.sets.binary_search_by_key(&set, |(id, _)| *id).ok()?;
        Some(self.sets.remove(pos).1)
    }

    #[must_use]
    pub fn get(&self, set: DescriptorSetId) -> Option<&'a BindingTable> {
        let pos = self.sets.binary_search_by_key(&set, |(id, _)| *id).ok()?;
        Some(self.sets[pos].1)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DescriptorSetId, &'a BindingTable)> + '_ {
        self.sets.iter().copied()
    }

    /// Compiled handles in set order, `None` while any table is uncompiled.
    #[must_use]
    pub fn compiled_handles(&self) -> Option<SmallVec<[RawPipelineResourcesId; MAX_DESCRIPTOR_SETS]>> {
        self.sets.iter().map(|(_, table)| table.cached_handle()).collect()
    }

    /// Dynamic offsets of every table, concatenated in set order.
    #[must_use]
    pub fn dynamic_offsets(&self) -> SmallVec<[u32; 16]> {
        self.sets
            .iter()
            .flat_map(|(_, table)| table.dynamic_offsets().iter().copied())
            .collect()
    }
}
