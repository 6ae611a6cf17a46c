//! Capability validator
//!
//! Pure decisions over a [`DeviceCaps`] snapshot. A rejection is an ordinary
//! `false`; the reason is logged at debug level so that callers escalating it
//! can point at the log.

use fgcache_core::{ImageAspect, ImageDim, ImageFlags, ImageUsage, ImageViewType, MemoryType, PixelFormat};
use fgcache_resources::{ImageDesc, ImageViewDesc};

use crate::caps::{DeviceCaps, FormatFeatures};

/// Format features required by each usage bit. Transient, input and
/// shading-rate attachments need none.
const USAGE_FEATURES: &[(ImageUsage, FormatFeatures)] = &[
    (ImageUsage::TRANSFER_SRC, FormatFeatures::TRANSFER_SRC.union(FormatFeatures::BLIT_SRC)),
    (ImageUsage::TRANSFER_DST, FormatFeatures::TRANSFER_DST.union(FormatFeatures::BLIT_DST)),
    (ImageUsage::SAMPLED, FormatFeatures::SAMPLED_IMAGE.union(FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR)),
    (ImageUsage::STORAGE, FormatFeatures::STORAGE_IMAGE),
    (ImageUsage::SAMPLED_MIN_MAX, FormatFeatures::SAMPLED_IMAGE_FILTER_MINMAX),
    (ImageUsage::STORAGE_ATOMIC, FormatFeatures::STORAGE_IMAGE_ATOMIC),
    (ImageUsage::COLOR_ATTACHMENT, FormatFeatures::COLOR_ATTACHMENT),
    (ImageUsage::COLOR_ATTACHMENT_BLEND, FormatFeatures::COLOR_ATTACHMENT_BLEND),
    (ImageUsage::DEPTH_STENCIL_ATTACHMENT, FormatFeatures::DEPTH_STENCIL_ATTACHMENT),
];

fn required_features(usage: ImageUsage) -> FormatFeatures {
    USAGE_FEATURES
        .iter()
        .filter(|(bit, _)| usage.contains(*bit))
        .fold(FormatFeatures::empty(), |acc, (_, features)| acc | *features)
}

/// Whether an image described by `desc` can be created in memory of type
/// `memory`. Host-visible memory implies linear tiling.
#[must_use]
pub fn is_image_supported(caps: &DeviceCaps, desc: &ImageDesc, memory: MemoryType) -> bool {
    let tiling = memory.tiling();

    if !caps.image_create_flags.contains(desc.flags) {
        log::debug!(
            "Validator: creation flags {:?} not in device flags {:?}",
            desc.flags,
            caps.image_create_flags
        );
        return false;
    }

    if desc.usage.contains(ImageUsage::SHADING_RATE) && !caps.features.shading_rate_image {
        log::debug!("Validator: shading-rate usage without the shading-rate feature");
        return false;
    }

    let Some(format_caps) = caps.tiling(desc.format, tiling) else {
        log::debug!("Validator: format {:?} is not supported by the device", desc.format);
        return false;
    };

    let required = required_features(desc.usage);
    if !format_caps.features.contains(required) {
        log::debug!(
            "Validator: {:?} with {tiling:?} tiling lacks {:?} for usage {:?}",
            desc.format,
            required.difference(format_caps.features),
            desc.usage
        );
        return false;
    }

    let limits = format_caps.limits_for(desc.image_type);
    if desc.dimension.cmpgt(limits.max_extent).any() {
        log::debug!("Validator: extent {} exceeds {}", desc.dimension, limits.max_extent);
        return false;
    }
    if desc.max_level > limits.max_mip_levels {
        log::debug!("Validator: {} mip levels exceed {}", desc.max_level, limits.max_mip_levels);
        return false;
    }
    if desc.array_layers > limits.max_array_layers {
        log::debug!("Validator: {} layers exceed {}", desc.array_layers, limits.max_array_layers);
        return false;
    }
    if !limits.sample_counts.contains(desc.samples.as_flag()) {
        log::debug!("Validator: sample count {} not in {:?}", desc.samples.get(), limits.sample_counts);
        return false;
    }

    true
}

/// Whether `view` is a legal view of an image described by `image`.
/// `view` is expected to be normalized against `image`.
#[must_use]
pub fn is_view_supported(caps: &DeviceCaps, image: &ImageDesc, view: &ImageViewDesc) -> bool {
    match view.view_type {
        ImageViewType::CubeArray => {
            if !caps.features.image_cube_array {
                log::debug!("Validator: cube-array view without the image-cube-array feature");
                return false;
            }
            if image.image_type != ImageDim::D2 || !image.flags.contains(ImageFlags::CUBE_COMPATIBLE) {
                log::debug!("Validator: cube-array view of a non cube-compatible image");
                return false;
            }
            if view.layer_count == 0 || view.layer_count % 6 != 0 {
                log::debug!("Validator: cube-array view with {} layers", view.layer_count);
                return false;
            }
        }
        ImageViewType::Cube => {
            if !image.flags.contains(ImageFlags::CUBE_COMPATIBLE) {
                log::debug!("Validator: cube view of a non cube-compatible image");
                return false;
            }
            if view.layer_count != 6 {
                log::debug!("Validator: cube view with {} layers", view.layer_count);
                return false;
            }
        }
        _ => {}
    }

    if image.image_type == ImageDim::D3
        && view.view_type != ImageViewType::D3
        && !image.flags.contains(ImageFlags::ARRAY_2D_COMPATIBLE)
    {
        log::debug!("Validator: {:?} view of a 3D image without array-2D compatibility", view.view_type);
        return false;
    }

    if view.format != PixelFormat::Unknown && view.format != image.format {
        return is_reinterpretation_supported(image, view);
    }

    true
}

fn is_reinterpretation_supported(image: &ImageDesc, view: &ImageViewDesc) -> bool {
    if !image.flags.contains(ImageFlags::MUTABLE_FORMAT) {
        log::debug!(
            "Validator: {:?} view of a {:?} image without mutable format",
            view.format,
            image.format
        );
        return false;
    }

    let image_info = image.format.info();
    let view_info = view.format.info();
    let image_compressed = image_info.is_compressed();
    let view_compressed = view_info.is_compressed();

    // compressed image seen through an uncompressed view, one texel per block
    if image.flags.contains(ImageFlags::BLOCK_TEXEL_VIEW_COMPATIBLE) && image_compressed && !view_compressed {
        if image_info.bits_per_block != view_info.bits_per_block {
            log::debug!(
                "Validator: block size {} of {:?} does not match texel size {} of {:?}",
                image_info.bits_per_block,
                image.format,
                view_info.bits_per_block,
                view.format
            );
            return false;
        }
        return true;
    }

    if image_compressed != view_compressed || image_info.block_size != view_info.block_size {
        log::debug!("Validator: {:?} and {:?} are not in the same compression class", image.format, view.format);
        return false;
    }

    let (image_bits, view_bits) = if view.aspect_mask == ImageAspect::STENCIL {
        (image_info.stencil_bits_per_block, view_info.stencil_bits_per_block)
    } else {
        (image_info.bits_per_block, view_info.bits_per_block)
    };
    if image_bits != view_bits {
        log::debug!(
            "Validator: {:?} ({image_bits} bits) cannot be viewed as {:?} ({view_bits} bits)",
            image.format,
            view.format
        );
        return false;
    }

    true
}
