//! Vulkan backend over `ash`
//!
//! [`AshDevice`] forwards the native seam to a logical device. The caller
//! owns the `ash::Device` and keeps it alive until every image created
//! through it has been destroyed.

use std::ffi::CString;

use ash::vk::{self, Handle};
use fgcache_core::{
    FgError, ImageAspect, ImageDim, ImageFlags, ImageHandle, ImageLayout, ImageTiling, ImageUsage,
    ImageViewHandle, ImageViewType, ObjectKind, PixelFormat, Result, SampleCounts,
};
use fgcache_resources::{ImageViewDesc, SwizzleComponent};
use glam::UVec3;

use crate::caps::{DeviceCaps, DeviceFeatures, FormatCaps, FormatFeatures, ImageFormatLimits, TilingCaps};
use crate::device::{ImageCreateInfo, NativeDevice, SharingMode};

// ============================================================================
// Conversions
// ============================================================================

#[must_use]
pub fn vk_format(format: PixelFormat) -> vk::Format {
    match format {
        PixelFormat::Unknown => vk::Format::UNDEFINED,
        PixelFormat::R8_UNorm => vk::Format::R8_UNORM,
        PixelFormat::RG8_UNorm => vk::Format::R8G8_UNORM,
        PixelFormat::RGBA8_UNorm => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::sRGB8_A8 => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::BGRA8_UNorm => vk::Format::B8G8R8A8_UNORM,
        PixelFormat::sBGR8_A8 => vk::Format::B8G8R8A8_SRGB,
        PixelFormat::RGB10_A2_UNorm => vk::Format::A2B10G10R10_UNORM_PACK32,
        PixelFormat::R16F => vk::Format::R16_SFLOAT,
        PixelFormat::RG16F => vk::Format::R16G16_SFLOAT,
        PixelFormat::RGBA16F => vk::Format::R16G16B16A16_SFLOAT,
        PixelFormat::R32U => vk::Format::R32_UINT,
        PixelFormat::R32I => vk::Format::R32_SINT,
        PixelFormat::R32F => vk::Format::R32_SFLOAT,
        PixelFormat::RG32U => vk::Format::R32G32_UINT,
        PixelFormat::RG32F => vk::Format::R32G32_SFLOAT,
        PixelFormat::RGBA32U => vk::Format::R32G32B32A32_UINT,
        PixelFormat::RGBA32F => vk::Format::R32G32B32A32_SFLOAT,
        PixelFormat::Depth16 => vk::Format::D16_UNORM,
        PixelFormat::Depth24 => vk::Format::X8_D24_UNORM_PACK32,
        PixelFormat::Depth32F => vk::Format::D32_SFLOAT,
        PixelFormat::Depth16_Stencil8 => vk::Format::D16_UNORM_S8_UINT,
        PixelFormat::Depth24_Stencil8 => vk::Format::D24_UNORM_S8_UINT,
        PixelFormat::Depth32F_Stencil8 => vk::Format::D32_SFLOAT_S8_UINT,
        PixelFormat::BC1_RGB8_UNorm => vk::Format::BC1_RGB_UNORM_BLOCK,
        PixelFormat::BC1_RGBA8_UNorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        PixelFormat::BC3_RGBA8_UNorm => vk::Format::BC3_UNORM_BLOCK,
        PixelFormat::BC4_R8_UNorm => vk::Format::BC4_UNORM_BLOCK,
        PixelFormat::BC5_RG8_UNorm => vk::Format::BC5_UNORM_BLOCK,
        PixelFormat::BC7_RGBA8_UNorm => vk::Format::BC7_UNORM_BLOCK,
        PixelFormat::ETC2_RGB8_UNorm => vk::Format::ETC2_R8G8B8_UNORM_BLOCK,
        PixelFormat::ASTC_RGBA_4x4 => vk::Format::ASTC_4X4_UNORM_BLOCK,
        PixelFormat::ASTC_RGBA_8x8 => vk::Format::ASTC_8X8_UNORM_BLOCK,
    }
}

#[must_use]
pub fn vk_layout(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachmentOptimal => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachmentOptimal => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::ShaderReadOnlyOptimal => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrcOptimal => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDstOptimal => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::Preinitialized => vk::ImageLayout::PREINITIALIZED,
    }
}

#[must_use]
pub fn vk_usage(usage: ImageUsage) -> vk::ImageUsageFlags {
    const MAP: &[(ImageUsage, vk::ImageUsageFlags)] = &[
        (ImageUsage::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
        (ImageUsage::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
        (ImageUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
        (ImageUsage::STORAGE, vk::ImageUsageFlags::STORAGE),
        (ImageUsage::COLOR_ATTACHMENT, vk::ImageUsageFlags::COLOR_ATTACHMENT),
        (ImageUsage::DEPTH_STENCIL_ATTACHMENT, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
        (ImageUsage::TRANSIENT_ATTACHMENT, vk::ImageUsageFlags::TRANSIENT_ATTACHMENT),
        (ImageUsage::INPUT_ATTACHMENT, vk::ImageUsageFlags::INPUT_ATTACHMENT),
        (ImageUsage::SHADING_RATE, vk::ImageUsageFlags::FRAGMENT_SHADING_RATE_ATTACHMENT_KHR),
    ];
    MAP.iter()
        .filter(|(bit, _)| usage.contains(*bit))
        .fold(vk::ImageUsageFlags::empty(), |acc, (_, vk)| acc | *vk)
}

#[must_use]
pub fn vk_image_flags(flags: ImageFlags) -> vk::ImageCreateFlags {
    let mut out = vk::ImageCreateFlags::empty();
    if flags.contains(ImageFlags::CUBE_COMPATIBLE) {
        out |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
    }
    if flags.contains(ImageFlags::ARRAY_2D_COMPATIBLE) {
        out |= vk::ImageCreateFlags::TYPE_2D_ARRAY_COMPATIBLE;
    }
    if flags.contains(ImageFlags::MUTABLE_FORMAT) {
        out |= vk::ImageCreateFlags::MUTABLE_FORMAT;
    }
    if flags.contains(ImageFlags::BLOCK_TEXEL_VIEW_COMPATIBLE) {
        out |= vk::ImageCreateFlags::BLOCK_TEXEL_VIEW_COMPATIBLE;
    }
    out
}

#[must_use]
pub fn vk_aspect(aspect: ImageAspect) -> vk::ImageAspectFlags {
    let mut out = vk::ImageAspectFlags::empty();
    if aspect.contains(ImageAspect::COLOR) {
        out |= vk::ImageAspectFlags::COLOR;
    }
    if aspect.contains(ImageAspect::DEPTH) {
        out |= vk::ImageAspectFlags::DEPTH;
    }
    if aspect.contains(ImageAspect::STENCIL) {
        out |= vk::ImageAspectFlags::STENCIL;
    }
    out
}

fn vk_image_type(dim: ImageDim) -> vk::ImageType {
    match dim {
        ImageDim::D1 => vk::ImageType::TYPE_1D,
        ImageDim::D2 => vk::ImageType::TYPE_2D,
        ImageDim::D3 => vk::ImageType::TYPE_3D,
    }
}

fn vk_view_type(view_type: ImageViewType) -> vk::ImageViewType {
    match view_type {
        ImageViewType::D1 => vk::ImageViewType::TYPE_1D,
        ImageViewType::D1Array => vk::ImageViewType::TYPE_1D_ARRAY,
        ImageViewType::D2 => vk::ImageViewType::TYPE_2D,
        ImageViewType::D2Array => vk::ImageViewType::TYPE_2D_ARRAY,
        ImageViewType::Cube => vk::ImageViewType::CUBE,
        ImageViewType::CubeArray => vk::ImageViewType::CUBE_ARRAY,
        ImageViewType::D3 => vk::ImageViewType::TYPE_3D,
    }
}

fn vk_tiling(tiling: ImageTiling) -> vk::ImageTiling {
    match tiling {
        ImageTiling::Optimal => vk::ImageTiling::OPTIMAL,
        ImageTiling::Linear => vk::ImageTiling::LINEAR,
    }
}

fn vk_swizzle(component: SwizzleComponent) -> vk::ComponentSwizzle {
    match component {
        SwizzleComponent::Identity => vk::ComponentSwizzle::IDENTITY,
        SwizzleComponent::R => vk::ComponentSwizzle::R,
        SwizzleComponent::G => vk::ComponentSwizzle::G,
        SwizzleComponent::B => vk::ComponentSwizzle::B,
        SwizzleComponent::A => vk::ComponentSwizzle::A,
        SwizzleComponent::Zero => vk::ComponentSwizzle::ZERO,
        SwizzleComponent::One => vk::ComponentSwizzle::ONE,
    }
}

fn format_features(features: vk::FormatFeatureFlags) -> FormatFeatures {
    const MAP: &[(vk::FormatFeatureFlags, FormatFeatures)] = &[
        (vk::FormatFeatureFlags::SAMPLED_IMAGE, FormatFeatures::SAMPLED_IMAGE),
        (vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR, FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR),
        (vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_MINMAX, FormatFeatures::SAMPLED_IMAGE_FILTER_MINMAX),
        (vk::FormatFeatureFlags::STORAGE_IMAGE, FormatFeatures::STORAGE_IMAGE),
        (vk::FormatFeatureFlags::STORAGE_IMAGE_ATOMIC, FormatFeatures::STORAGE_IMAGE_ATOMIC),
        (vk::FormatFeatureFlags::COLOR_ATTACHMENT, FormatFeatures::COLOR_ATTACHMENT),
        (vk::FormatFeatureFlags::COLOR_ATTACHMENT_BLEND, FormatFeatures::COLOR_ATTACHMENT_BLEND),
        (vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT, FormatFeatures::DEPTH_STENCIL_ATTACHMENT),
        (vk::FormatFeatureFlags::BLIT_SRC, FormatFeatures::BLIT_SRC),
        (vk::FormatFeatureFlags::BLIT_DST, FormatFeatures::BLIT_DST),
        (vk::FormatFeatureFlags::TRANSFER_SRC, FormatFeatures::TRANSFER_SRC),
        (vk::FormatFeatureFlags::TRANSFER_DST, FormatFeatures::TRANSFER_DST),
    ];
    MAP.iter()
        .filter(|(vk, _)| features.contains(*vk))
        .fold(FormatFeatures::empty(), |acc, (_, bit)| acc | *bit)
}

/// Widest usage a format with `features` can be created with, used to query
/// its limits.
fn usage_for_features(features: FormatFeatures) -> vk::ImageUsageFlags {
    let mut usage = vk::ImageUsageFlags::empty();
    if features.contains(FormatFeatures::TRANSFER_SRC) {
        usage |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if features.contains(FormatFeatures::TRANSFER_DST) {
        usage |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if features.contains(FormatFeatures::SAMPLED_IMAGE) {
        usage |= vk::ImageUsageFlags::SAMPLED;
    }
    if features.contains(FormatFeatures::STORAGE_IMAGE) {
        usage |= vk::ImageUsageFlags::STORAGE;
    }
    if features.contains(FormatFeatures::COLOR_ATTACHMENT) {
        usage |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if features.contains(FormatFeatures::DEPTH_STENCIL_ATTACHMENT) {
        usage |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    usage
}

fn native_error(call: &'static str, result: vk::Result) -> FgError {
    FgError::NativeCall {
        call,
        code: result.as_raw(),
    }
}

// ============================================================================
// Capability query
// ============================================================================

impl DeviceCaps {
    /// Snapshots the capabilities of `physical_device`. The device must
    /// support Vulkan 1.1.
    #[must_use]
    pub fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let mut shading_rate = vk::PhysicalDeviceFragmentShadingRateFeaturesKHR::default();
        let image_cube_array = {
            let mut features = vk::PhysicalDeviceFeatures2::default().push_next(&mut shading_rate);
            // SAFETY: `physical_device` was enumerated from `instance`.
            unsafe { instance.get_physical_device_features2(physical_device, &mut features) };
            features.features.image_cube_array == vk::TRUE
        };

        let formats = PixelFormat::ALL
            .iter()
            .filter_map(|&format| {
                let caps = query_format(instance, physical_device, format);
                let supported = !caps.optimal.features.is_empty() || !caps.linear.features.is_empty();
                supported.then_some((format, caps))
            })
            .collect();

        let caps = Self {
            features: DeviceFeatures {
                image_cube_array,
                shading_rate_image: shading_rate.attachment_fragment_shading_rate == vk::TRUE,
            },
            image_create_flags: ImageFlags::all(),
            formats,
        };
        log::info!(
            "DeviceCaps: {} formats supported, cube arrays: {}, shading rate: {}",
            caps.formats.len(),
            caps.features.image_cube_array,
            caps.features.shading_rate_image
        );
        caps
    }
}

fn query_format(instance: &ash::Instance, physical_device: vk::PhysicalDevice, format: PixelFormat) -> FormatCaps {
    let vk_format = vk_format(format);
    // SAFETY: `physical_device` was enumerated from `instance`.
    let props = unsafe { instance.get_physical_device_format_properties(physical_device, vk_format) };

    let tiling_caps = |tiling: vk::ImageTiling, features: vk::FormatFeatureFlags| {
        let features = format_features(features);
        let usage = limits_query_usage(features);
        if usage.is_empty() {
            return TilingCaps::default();
        }
        let limits_of = |image_type: vk::ImageType| {
            // SAFETY: `physical_device` was enumerated from `instance`.
            let props = unsafe {
                instance.get_physical_device_image_format_properties(
                    physical_device,
                    vk_format,
                    image_type,
                    tiling,
                    usage,
                    vk::ImageCreateFlags::empty(),
                )
            };
            match props {
                Ok(props) => image_format_limits(&props),
                Err(err) => {
                    log::debug!("DeviceCaps: no {tiling:?} {image_type:?} limits for {format:?}: {err}");
                    ImageFormatLimits::default()
                }
            }
        };
        TilingCaps {
            features,
            limits: limits_of(vk::ImageType::TYPE_2D),
            limits_1d: Some(limits_of(vk::ImageType::TYPE_1D)),
            limits_3d: Some(limits_of(vk::ImageType::TYPE_3D)),
        }
    };

    FormatCaps {
        optimal: tiling_caps(vk::ImageTiling::OPTIMAL, props.optimal_tiling_features),
        linear: tiling_caps(vk::ImageTiling::LINEAR, props.linear_tiling_features),
    }
}

/// Usage passed to the limits query. Storage is left out unless it is the
/// only usage, since drivers report single-sampled limits for storage images.
fn limits_query_usage(features: FormatFeatures) -> vk::ImageUsageFlags {
    let usage = usage_for_features(features);
    let without_storage = usage & !vk::ImageUsageFlags::STORAGE;
    if without_storage.is_empty() { usage } else { without_storage }
}

fn image_format_limits(props: &vk::ImageFormatProperties) -> ImageFormatLimits {
    ImageFormatLimits {
        max_extent: UVec3::new(props.max_extent.width, props.max_extent.height, props.max_extent.depth),
        max_mip_levels: props.max_mip_levels,
        max_array_layers: props.max_array_layers,
        sample_counts: SampleCounts::from_bits_truncate(props.sample_counts.as_raw()),
    }
}

// ============================================================================
// Device
// ============================================================================

pub struct AshDevice {
    device: ash::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,
}

impl AshDevice {
    /// `debug_utils` is only needed for object names.
    #[must_use]
    pub fn new(device: ash::Device, debug_utils: Option<ash::ext::debug_utils::Device>) -> Self {
        Self { device, debug_utils }
    }

    #[must_use]
    pub fn raw(&self) -> &ash::Device {
        &self.device
    }
}

impl NativeDevice for AshDevice {
    fn create_image(&self, info: &ImageCreateInfo<'_>) -> Result<ImageHandle> {
        let desc = info.desc;
        let (sharing_mode, families) = match &info.sharing {
            SharingMode::Exclusive => (vk::SharingMode::EXCLUSIVE, &[][..]),
            SharingMode::Concurrent(families) => (vk::SharingMode::CONCURRENT, families.as_slice()),
        };

        let create_info = vk::ImageCreateInfo::default()
            .flags(vk_image_flags(desc.flags))
            .image_type(vk_image_type(desc.image_type))
            .format(vk_format(desc.format))
            .extent(vk::Extent3D {
                width: desc.dimension.x,
                height: desc.dimension.y,
                depth: desc.dimension.z,
            })
            .mip_levels(desc.max_level)
            .array_layers(desc.array_layers)
            .samples(vk::SampleCountFlags::from_raw(desc.samples.get()))
            .tiling(vk_tiling(info.tiling))
            .usage(vk_usage(desc.usage))
            .sharing_mode(sharing_mode)
            .queue_family_indices(families)
            .initial_layout(vk_layout(info.initial_layout));

        // SAFETY: the create info only borrows locals that outlive the call.
        let image = unsafe { self.device.create_image(&create_info, None) }
            .map_err(|err| native_error("vkCreateImage", err))?;
        ImageHandle::from_raw(image.as_raw()).ok_or_else(|| native_error("vkCreateImage", vk::Result::ERROR_UNKNOWN))
    }

    fn destroy_image(&self, image: ImageHandle) {
        // SAFETY: the lifecycle manager destroys every view first and never
        // reuses the handle.
        unsafe { self.device.destroy_image(vk::Image::from_raw(image.as_raw()), None) };
    }

    fn create_image_view(&self, image: ImageHandle, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        let [r, g, b, a] = desc.swizzle.0.map(vk_swizzle);
        let create_info = vk::ImageViewCreateInfo::default()
            .image(vk::Image::from_raw(image.as_raw()))
            .view_type(vk_view_type(desc.view_type))
            .format(vk_format(desc.format))
            .components(vk::ComponentMapping { r, g, b, a })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk_aspect(desc.aspect_mask),
                base_mip_level: desc.base_level,
                level_count: desc.level_count,
                base_array_layer: desc.base_layer,
                layer_count: desc.layer_count,
            });

        // SAFETY: `image` is live for as long as its owner holds the view cache.
        let view = unsafe { self.device.create_image_view(&create_info, None) }
            .map_err(|err| native_error("vkCreateImageView", err))?;
        ImageViewHandle::from_raw(view.as_raw()).ok_or_else(|| native_error("vkCreateImageView", vk::Result::ERROR_UNKNOWN))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        // SAFETY: views are destroyed exactly once, by the owning image.
        unsafe { self.device.destroy_image_view(vk::ImageView::from_raw(view.as_raw()), None) };
    }

    fn set_object_name(&self, raw: u64, kind: ObjectKind, name: &str) {
        let Some(debug_utils) = self.debug_utils.as_ref() else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            log::warn!("AshDevice: debug name {name:?} contains a NUL byte");
            return;
        };

        let info = vk::DebugUtilsObjectNameInfoEXT::default().object_name(&name);
        let info = match kind {
            ObjectKind::Image => info.object_handle(vk::Image::from_raw(raw)),
            ObjectKind::ImageView => info.object_handle(vk::ImageView::from_raw(raw)),
        };
        // SAFETY: `raw` is a live object of this device.
        if let Err(err) = unsafe { debug_utils.set_debug_utils_object_name(&info) } {
            log::warn!("AshDevice: failed to name {kind:?} {raw:#x}: {err}");
        }
    }
}
