//! Native device seam
//!
//! [`NativeDevice`] is the narrow set of native calls the lifecycle manager
//! needs. [`Device`] bundles an implementation with the memory service, the
//! capability snapshot and the settings, the context every create, view and
//! destroy call runs against.

use std::sync::Arc;

use fgcache_core::config::MAX_QUEUE_FAMILY_INDICES;
use fgcache_core::{ImageHandle, ImageLayout, ImageTiling, ImageViewHandle, ObjectKind, QueueFamilyMask, Result};
use fgcache_resources::{ImageDesc, ImageViewDesc};
use smallvec::SmallVec;

use crate::caps::DeviceCaps;
use crate::memory::MemoryService;
use crate::settings::ResourceSettings;

/// Queue family sharing of an image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SharingMode {
    #[default]
    Exclusive,
    /// Two or more distinct queue families, ascending.
    Concurrent(SmallVec<[u32; MAX_QUEUE_FAMILY_INDICES]>),
}

impl SharingMode {
    /// Concurrent sharing only pays off with at least two families; anything
    /// less falls back to exclusive mode.
    #[must_use]
    pub fn from_mask(mask: QueueFamilyMask) -> Self {
        let indices: SmallVec<[u32; MAX_QUEUE_FAMILY_INDICES]> =
            mask.indices().take(MAX_QUEUE_FAMILY_INDICES).collect();
        if indices.len() < 2 { Self::Exclusive } else { Self::Concurrent(indices) }
    }

    #[must_use]
    pub fn queue_family_indices(&self) -> &[u32] {
        match self {
            Self::Exclusive => &[],
            Self::Concurrent(indices) => indices,
        }
    }
}

/// Everything the native device needs to create an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCreateInfo<'a> {
    pub desc: &'a ImageDesc,
    pub tiling: ImageTiling,
    pub initial_layout: ImageLayout,
    pub sharing: SharingMode,
}

/// Native object calls.
pub trait NativeDevice: Send + Sync {
    /// # Errors
    /// Returns [`FgError::NativeCall`](fgcache_core::FgError::NativeCall) if
    /// the driver rejects the call.
    fn create_image(&self, info: &ImageCreateInfo<'_>) -> Result<ImageHandle>;

    fn destroy_image(&self, image: ImageHandle);

    /// `desc` is normalized against the image.
    ///
    /// # Errors
    /// Returns [`FgError::NativeCall`](fgcache_core::FgError::NativeCall) if
    /// the driver rejects the call.
    fn create_image_view(&self, image: ImageHandle, desc: &ImageViewDesc) -> Result<ImageViewHandle>;

    fn destroy_image_view(&self, view: ImageViewHandle);

    /// Attaches a debug name to a native object.
    fn set_object_name(&self, raw: u64, kind: ObjectKind, name: &str);
}

impl<T: NativeDevice + ?Sized> NativeDevice for Arc<T> {
    fn create_image(&self, info: &ImageCreateInfo<'_>) -> Result<ImageHandle> {
        (**self).create_image(info)
    }

    fn destroy_image(&self, image: ImageHandle) {
        (**self).destroy_image(image);
    }

    fn create_image_view(&self, image: ImageHandle, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        (**self).create_image_view(image, desc)
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        (**self).destroy_image_view(view);
    }

    fn set_object_name(&self, raw: u64, kind: ObjectKind, name: &str) {
        (**self).set_object_name(raw, kind, name);
    }
}

/// Native device plus the services and configuration resources are created
/// against.
pub struct Device {
    native: Box<dyn NativeDevice>,
    memory: Box<dyn MemoryService>,
    caps: DeviceCaps,
    settings: ResourceSettings,
}

impl Device {
    #[must_use]
    pub fn new(native: impl NativeDevice + 'static, memory: impl MemoryService + 'static, caps: DeviceCaps) -> Self {
        Self {
            native: Box::new(native),
            memory: Box::new(memory),
            caps,
            settings: ResourceSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ResourceSettings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    #[must_use]
    pub fn native(&self) -> &dyn NativeDevice {
        self.native.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn memory(&self) -> &dyn MemoryService {
        self.memory.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ResourceSettings {
        &self.settings
    }

    /// Forwards `name` to the native device unless debug names are off or
    /// the name is empty.
    pub fn set_object_name(&self, raw: u64, kind: ObjectKind, name: &str) {
        if self.settings.debug_names && !name.is_empty() {
            self.native.set_object_name(raw, kind, name);
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("caps", &self.caps)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
