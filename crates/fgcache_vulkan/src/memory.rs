//! Memory service seam
//!
//! Allocation is not done here. The allocation service hands out opaque
//! [`RawMemoryId`]s; the lifecycle manager only asks for the visibility class
//! (to pick the tiling), binds a fresh image to the memory and releases the
//! memory when a self-owned image is destroyed.

use std::sync::Arc;

use fgcache_core::{ImageHandle, MemoryType, RawMemoryId, Result};

pub trait MemoryService: Send + Sync {
    /// Visibility class of `memory`.
    fn memory_type(&self, memory: RawMemoryId) -> MemoryType;

    /// Allocates backing storage for `image` from `memory` and binds it.
    ///
    /// # Errors
    /// Returns [`FgError::MemoryBind`](fgcache_core::FgError::MemoryBind) if
    /// the memory cannot back the image.
    fn bind_image(&self, memory: RawMemoryId, image: ImageHandle) -> Result<()>;

    /// Returns `memory` to the allocation service.
    fn release(&self, memory: RawMemoryId);
}

impl<T: MemoryService + ?Sized> MemoryService for Arc<T> {
    fn memory_type(&self, memory: RawMemoryId) -> MemoryType {
        (**self).memory_type(memory)
    }

    fn bind_image(&self, memory: RawMemoryId, image: ImageHandle) -> Result<()> {
        (**self).bind_image(memory, image)
    }

    fn release(&self, memory: RawMemoryId) {
        (**self).release(memory);
    }
}
