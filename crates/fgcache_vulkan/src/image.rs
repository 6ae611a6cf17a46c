//! Image lifecycle and view cache
//!
//! An [`Image`] owns one native image plus every view derived from it.
//!
//! # Ownership
//!
//! An image is either **owned** (created here, bound to memory handed out by
//! the allocation service) or **adopted** (created elsewhere and described by
//! an [`ExternalImageDesc`]). An owned image keeps its memory id; an adopted
//! image keeps an optional release callback instead. Destruction dispatches on
//! which of the two is live.
//!
//! # View cache
//!
//! Views are keyed by their normalized [`ImageViewDesc`]. Lookups take the
//! shared lock; a miss takes the exclusive lock, checks again and only then
//! creates the native view, so concurrent requests for one descriptor create
//! exactly one view. A failed creation inserts nothing.
//!
//! # Teardown
//!
//! [`Image::destroy`] destroys every cached view, then destroys (owned) or
//! releases (adopted) the native image, then returns the memory. It must not
//! race with view requests; the caller sequences it after them.

use std::fmt;

use fgcache_core::config::{MAX_QUEUE_FAMILIES, MAX_QUEUE_FAMILY_INDICES};
use fgcache_core::{
    AccessFlags, FgError, ImageAspect, ImageDim, ImageFlags, ImageHandle, ImageLayout, ImageTiling, ImageUsage,
    ImageViewHandle, MemoryType, ObjectKind, PixelFormat, QueueFamilyMask, RawMemoryId, Result, SampleCount,
};
use fgcache_resources::{ImageDesc, ImageViewDesc};
use glam::UVec3;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::device::{Device, ImageCreateInfo, SharingMode};
use crate::settings::ValidationMode;
use crate::validator;

/// Called with the native handle when an adopted image is destroyed.
pub type OnRelease = Box<dyn FnOnce(ImageHandle) + Send + Sync>;

/// Description of a native image created outside of this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalImageDesc {
    pub image: ImageHandle,
    pub image_type: ImageDim,
    pub flags: ImageFlags,
    pub usage: ImageUsage,
    pub format: PixelFormat,
    pub current_layout: ImageLayout,
    /// `Undefined` lets the usage pick the default layout.
    pub default_layout: ImageLayout,
    pub samples: SampleCount,
    pub dimension: UVec3,
    pub array_layers: u32,
    pub max_levels: u32,
    /// Empty for exclusive sharing, otherwise two or more families.
    pub queue_family_indices: SmallVec<[u32; MAX_QUEUE_FAMILY_INDICES]>,
}

enum Ownership {
    Owned { memory: RawMemoryId },
    Adopted { on_release: Option<OnRelease> },
}

impl fmt::Debug for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owned { memory } => f.debug_struct("Owned").field("memory", memory).finish(),
            Self::Adopted { on_release } => f
                .debug_struct("Adopted")
                .field("on_release", &on_release.is_some())
                .finish(),
        }
    }
}

#[derive(Debug)]
struct LiveImage {
    handle: ImageHandle,
    desc: ImageDesc,
    ownership: Ownership,
    queue_families: QueueFamilyMask,
    /// Explicit default layout, `Undefined` when derived from usage.
    layout_hint: ImageLayout,
    debug_name: String,
}

/// Aspects addressed by a whole-image view of `format`.
fn choose_aspect(format: PixelFormat) -> ImageAspect {
    format.aspect_mask()
}

/// Layout the image rests in between passes. Attachment layouts win over
/// read-only ones to avoid needless decompression.
fn choose_default_layout(usage: ImageUsage, hint: ImageLayout) -> ImageLayout {
    if !matches!(hint, ImageLayout::Undefined) {
        return hint;
    }
    if usage.contains(ImageUsage::COLOR_ATTACHMENT) {
        ImageLayout::ColorAttachmentOptimal
    } else if usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT) {
        ImageLayout::DepthStencilAttachmentOptimal
    } else if usage.contains(ImageUsage::SAMPLED) {
        ImageLayout::ShaderReadOnlyOptimal
    } else {
        ImageLayout::General
    }
}

/// Every access kind a read of an image with `usage` may perform.
fn read_access_mask(usage: ImageUsage) -> AccessFlags {
    const READS: &[(ImageUsage, AccessFlags)] = &[
        (ImageUsage::TRANSFER_SRC, AccessFlags::TRANSFER_READ),
        (ImageUsage::SAMPLED, AccessFlags::SHADER_READ),
        (ImageUsage::STORAGE, AccessFlags::SHADER_READ),
        (ImageUsage::COLOR_ATTACHMENT, AccessFlags::COLOR_ATTACHMENT_READ),
        (ImageUsage::DEPTH_STENCIL_ATTACHMENT, AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ),
        (ImageUsage::INPUT_ATTACHMENT, AccessFlags::INPUT_ATTACHMENT_READ),
        (ImageUsage::SHADING_RATE, AccessFlags::SHADING_RATE_IMAGE_READ),
    ];
    READS
        .iter()
        .filter(|(bit, _)| usage.contains(*bit))
        .fold(AccessFlags::empty(), |acc, (_, access)| acc | *access)
}

/// Applies the configured validation mode to a capability decision.
fn gate(mode: ValidationMode, supported: impl FnOnce() -> bool, error: impl FnOnce() -> FgError) -> Result<()> {
    if mode == ValidationMode::Disabled || supported() {
        return Ok(());
    }
    let error = error();
    if mode == ValidationMode::Strict {
        return Err(error);
    }
    log::warn!("{error}");
    Ok(())
}

/// A native image and the views derived from it.
#[derive(Default)]
pub struct Image {
    live: RwLock<Option<LiveImage>>,
    views: RwLock<FxHashMap<ImageViewDesc, ImageViewHandle>>,
}

impl Image {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Creates a native image for `desc` and binds it to `memory`.
    ///
    /// Concurrent sharing is used only when `queue_families` names two or
    /// more families. `default_layout` overrides the usage-derived layout
    /// unless it is `Undefined`.
    ///
    /// # Errors
    /// - [`FgError::UnsupportedImage`] if the device rejects `desc` in strict
    ///   validation mode.
    /// - [`FgError::NativeCall`] if the driver fails to create the image.
    /// - [`FgError::MemoryBind`] if the memory cannot back the image; the new
    ///   native image is destroyed again.
    ///
    /// # Panics
    /// Panics if the image is already created, if `desc` is marked external
    /// or if it has no format or usage.
    pub fn create(
        &self,
        device: &Device,
        desc: &ImageDesc,
        memory: RawMemoryId,
        queue_families: QueueFamilyMask,
        default_layout: ImageLayout,
        debug_name: &str,
    ) -> Result<()> {
        let mut live = self.live.write();
        assert!(live.is_none(), "Image: create: '{debug_name}' is already created");
        assert!(!desc.is_external, "Image: create: descriptor of '{debug_name}' is marked external");
        assert!(desc.format != PixelFormat::Unknown, "Image: create: '{debug_name}' has no format");
        assert!(!desc.usage.is_empty(), "Image: create: '{debug_name}' has no usage");

        let mut desc = desc.clone();
        desc.validate();

        let memory_type: MemoryType = device.memory().memory_type(memory);
        gate(
            device.settings().validation,
            || validator::is_image_supported(device.caps(), &desc, memory_type),
            || FgError::UnsupportedImage(format!("'{debug_name}': {desc:?} in {memory_type:?} memory")),
        )?;

        let tiling = memory_type.tiling();
        let info = ImageCreateInfo {
            desc: &desc,
            tiling,
            initial_layout: match tiling {
                ImageTiling::Optimal => ImageLayout::Undefined,
                ImageTiling::Linear => ImageLayout::Preinitialized,
            },
            sharing: SharingMode::from_mask(queue_families),
        };
        let handle = device.native().create_image(&info)?;

        if let Err(err) = device.memory().bind_image(memory, handle) {
            log::error!("Image: failed to bind memory {memory:?} to '{debug_name}': {err}");
            device.native().destroy_image(handle);
            return Err(err);
        }

        device.set_object_name(handle.as_raw(), ObjectKind::Image, debug_name);
        log::debug!("Image: created '{debug_name}' {handle:?} ({:?}, {:?})", desc.format, desc.dimension);

        *live = Some(LiveImage {
            handle,
            desc,
            ownership: Ownership::Owned { memory },
            queue_families,
            layout_hint: default_layout,
            debug_name: debug_name.to_owned(),
        });
        Ok(())
    }

    /// Adopts a native image created elsewhere. No memory is bound;
    /// `on_release` runs instead of the native destroy call.
    ///
    /// # Errors
    /// Returns [`FgError::UnsupportedImage`] if the device rejects the
    /// described image in strict validation mode.
    ///
    /// # Panics
    /// Panics if the image is already created, if exactly one queue family
    /// is listed or if a listed family index is out of range.
    pub fn create_external(
        &self,
        device: &Device,
        external: &ExternalImageDesc,
        debug_name: &str,
        on_release: Option<OnRelease>,
    ) -> Result<()> {
        let mut live = self.live.write();
        assert!(live.is_none(), "Image: create_external: '{debug_name}' is already created");
        assert!(
            external.queue_family_indices.len() != 1,
            "Image: create_external: '{debug_name}' lists a single queue family, expected none or at least two"
        );
        if let Some(index) = external.queue_family_indices.iter().find(|&&i| i >= MAX_QUEUE_FAMILIES) {
            panic!(
                "Image: create_external: '{debug_name}' lists queue family {index:#x}, expected an index below {MAX_QUEUE_FAMILIES}"
            );
        }

        let desc = ImageDesc {
            image_type: external.image_type,
            dimension: external.dimension,
            format: external.format,
            usage: external.usage,
            flags: external.flags,
            array_layers: external.array_layers,
            max_level: external.max_levels,
            samples: external.samples,
            is_external: true,
        };
        gate(
            device.settings().validation,
            || validator::is_image_supported(device.caps(), &desc, MemoryType::empty()),
            || FgError::UnsupportedImage(format!("external '{debug_name}': {desc:?}")),
        )?;

        device.set_object_name(external.image.as_raw(), ObjectKind::Image, debug_name);
        log::debug!("Image: adopted '{debug_name}' {:?}", external.image);

        *live = Some(LiveImage {
            handle: external.image,
            desc,
            ownership: Ownership::Adopted { on_release },
            queue_families: external.queue_family_indices.iter().copied().collect(),
            layout_hint: external.default_layout,
            debug_name: debug_name.to_owned(),
        });
        Ok(())
    }

    // ========================================================================
    // Destruction
    // ========================================================================

    /// Destroys every view, then the image, then returns the memory. A no-op
    /// on an image that is not created.
    pub fn destroy(&self, device: &Device) {
        let mut live = self.live.write();

        let views: Vec<_> = self.views.write().drain().map(|(_, view)| view).collect();
        for view in &views {
            device.native().destroy_image_view(*view);
        }

        let Some(image) = live.take() else {
            return;
        };

        match image.ownership {
            Ownership::Adopted { on_release } => {
                if let Some(on_release) = on_release {
                    on_release(image.handle);
                }
            }
            Ownership::Owned { memory } => {
                device.native().destroy_image(image.handle);
                device.memory().release(memory);
            }
        }
        log::debug!(
            "Image: destroyed '{}' {:?} with {} views",
            image.debug_name,
            image.handle,
            views.len()
        );
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Returns the view matching `desc`, creating it on first request.
    ///
    /// `desc` is normalized against the image first, so descriptors that
    /// only differ in "inherit" values share one view.
    ///
    /// # Errors
    /// - [`FgError::NotCreated`] if the image has no native handle.
    /// - [`FgError::UnsupportedView`] if the view is rejected in strict
    ///   validation mode.
    /// - [`FgError::NativeCall`] if the driver fails to create the view.
    pub fn get_view(&self, device: &Device, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        let live = self.live.read();
        let image = live.as_ref().ok_or(FgError::NotCreated)?;
        self.view_of(device, image, desc.validated(&image.desc))
    }

    /// Returns the whole-image view.
    ///
    /// # Errors
    /// See [`Image::get_view`].
    pub fn get_default_view(&self, device: &Device) -> Result<ImageViewHandle> {
        let live = self.live.read();
        let image = live.as_ref().ok_or(FgError::NotCreated)?;
        self.view_of(device, image, ImageViewDesc::from_image(&image.desc).validated(&image.desc))
    }

    fn view_of(&self, device: &Device, image: &LiveImage, desc: ImageViewDesc) -> Result<ImageViewHandle> {
        gate(
            device.settings().validation,
            || validator::is_view_supported(device.caps(), &image.desc, &desc),
            || FgError::UnsupportedView(format!("'{}': {desc:?}", image.debug_name)),
        )?;

        if let Some(&view) = self.views.read().get(&desc) {
            return Ok(view);
        }

        let mut views = self.views.write();
        if let Some(&view) = views.get(&desc) {
            log::trace!("Image: view of '{}' created by another thread", image.debug_name);
            return Ok(view);
        }

        let view = device.native().create_image_view(image.handle, &desc)?;
        views.insert(desc, view);
        log::trace!("Image: created view {view:?} of '{}'", image.debug_name);
        Ok(view)
    }

    /// Number of cached views.
    #[must_use]
    pub fn view_count(&self) -> usize {
        self.views.read().len()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn is_created(&self) -> bool {
        self.live.read().is_some()
    }

    /// Native handle, `None` before creation and after destruction.
    #[must_use]
    pub fn handle(&self) -> Option<ImageHandle> {
        self.live.read().as_ref().map(|image| image.handle)
    }

    /// Validated descriptor, the empty default when not created.
    #[must_use]
    pub fn desc(&self) -> ImageDesc {
        self.live.read().as_ref().map(|image| image.desc.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn aspect_mask(&self) -> ImageAspect {
        self.live
            .read()
            .as_ref()
            .map_or(ImageAspect::empty(), |image| choose_aspect(image.desc.format))
    }

    #[must_use]
    pub fn default_layout(&self) -> ImageLayout {
        self.live
            .read()
            .as_ref()
            .map_or(ImageLayout::Undefined, |image| choose_default_layout(image.desc.usage, image.layout_hint))
    }

    #[must_use]
    pub fn read_access_mask(&self) -> AccessFlags {
        self.live
            .read()
            .as_ref()
            .map_or(AccessFlags::empty(), |image| read_access_mask(image.desc.usage))
    }

    #[must_use]
    pub fn queue_families(&self) -> QueueFamilyMask {
        self.live.read().as_ref().map_or(QueueFamilyMask::EMPTY, |image| image.queue_families)
    }

    /// Memory backing an owned image.
    #[must_use]
    pub fn memory(&self) -> Option<RawMemoryId> {
        match self.live.read().as_ref()?.ownership {
            Ownership::Owned { memory } => Some(memory),
            Ownership::Adopted { .. } => None,
        }
    }

    #[must_use]
    pub fn is_external(&self) -> bool {
        self.live.read().as_ref().is_some_and(|image| image.desc.is_external)
    }

    /// Whether no usage lets the GPU write into the image.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.live.read().as_ref().is_some_and(|image| image.desc.is_read_only())
    }

    #[must_use]
    pub fn debug_name(&self) -> String {
        self.live.read().as_ref().map(|image| image.debug_name.clone()).unwrap_or_default()
    }

    /// Describes the image in the form accepted by
    /// [`Image::create_external`], for handing it to another API user.
    #[must_use]
    pub fn api_description(&self) -> Option<ExternalImageDesc> {
        let live = self.live.read();
        let image = live.as_ref()?;
        let layout = choose_default_layout(image.desc.usage, image.layout_hint);
        Some(ExternalImageDesc {
            image: image.handle,
            image_type: image.desc.image_type,
            flags: image.desc.flags,
            usage: image.desc.usage,
            format: image.desc.format,
            current_layout: layout,
            default_layout: layout,
            samples: image.desc.samples,
            dimension: image.desc.dimension,
            array_layers: image.desc.array_layers,
            max_levels: image.desc.max_level,
            queue_family_indices: SharingMode::from_mask(image.queue_families)
                .queue_family_indices()
                .iter()
                .copied()
                .collect(),
        })
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("live", &*self.live.read())
            .field("views", &self.view_count())
            .finish()
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        if let Some(image) = self.live.get_mut() {
            log::error!(
                "Image: '{}' {:?} dropped without destroy, {} views leaked",
                image.debug_name,
                image.handle,
                self.views.get_mut().len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_prefers_attachments() {
        let usage = ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED;
        assert_eq!(choose_default_layout(usage, ImageLayout::Undefined), ImageLayout::ColorAttachmentOptimal);
        assert_eq!(
            choose_default_layout(ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::SAMPLED, ImageLayout::Undefined),
            ImageLayout::DepthStencilAttachmentOptimal
        );
        assert_eq!(choose_default_layout(ImageUsage::SAMPLED, ImageLayout::Undefined), ImageLayout::ShaderReadOnlyOptimal);
        assert_eq!(choose_default_layout(ImageUsage::STORAGE, ImageLayout::Undefined), ImageLayout::General);
        assert_eq!(choose_default_layout(usage, ImageLayout::TransferDstOptimal), ImageLayout::TransferDstOptimal);
    }

    #[test]
    fn read_access_follows_usage() {
        let access = read_access_mask(ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST | ImageUsage::STORAGE);
        assert_eq!(access, AccessFlags::TRANSFER_READ | AccessFlags::SHADER_READ);
    }

    #[test]
    fn gate_respects_validation_mode() {
        let err = || FgError::UnsupportedImage("test".into());
        assert!(gate(ValidationMode::Strict, || false, err).is_err());
        assert!(gate(ValidationMode::Warn, || false, err).is_ok());
        assert!(gate(ValidationMode::Disabled, || panic!("not evaluated"), err).is_ok());
        assert!(gate(ValidationMode::Strict, || true, err).is_ok());
    }

    #[test]
    fn uncreated_image_reports_empty_state() {
        let image = Image::new();
        assert!(!image.is_created());
        assert_eq!(image.handle(), None);
        assert_eq!(image.aspect_mask(), ImageAspect::empty());
        assert_eq!(image.default_layout(), ImageLayout::Undefined);
        assert!(image.api_description().is_none());
    }
}
