//! Image descriptor
//!
//! [`ImageDesc`] is the immutable description of a primary image. Call
//! [`ImageDesc::validate`] once before use: it clamps the dimension, mip and
//! layer counts into a consistent state so that two descriptors describing
//! the same image compare equal.

use fgcache_core::{ImageDim, ImageFlags, ImageUsage, PixelFormat, SampleCount};
use glam::UVec3;

/// Immutable description of an image.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    pub image_type: ImageDim,
    pub dimension: UVec3,
    pub format: PixelFormat,
    pub usage: ImageUsage,
    pub flags: ImageFlags,
    pub array_layers: u32,
    /// Number of mip levels.
    pub max_level: u32,
    pub samples: SampleCount,
    /// The native image was created outside of this layer.
    pub is_external: bool,
}

impl Default for ImageDesc {
    fn default() -> Self {
        Self {
            image_type: ImageDim::D2,
            dimension: UVec3::ONE,
            format: PixelFormat::Unknown,
            usage: ImageUsage::empty(),
            flags: ImageFlags::empty(),
            array_layers: 1,
            max_level: 1,
            samples: SampleCount::ONE,
            is_external: false,
        }
    }
}

impl ImageDesc {
    #[must_use]
    pub fn new(image_type: ImageDim, dimension: UVec3, format: PixelFormat, usage: ImageUsage) -> Self {
        Self {
            image_type,
            dimension,
            format,
            usage,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn d2(width: u32, height: u32, format: PixelFormat, usage: ImageUsage) -> Self {
        Self::new(ImageDim::D2, UVec3::new(width, height, 1), format, usage)
    }

    #[must_use]
    pub fn d3(width: u32, height: u32, depth: u32, format: PixelFormat, usage: ImageUsage) -> Self {
        Self::new(ImageDim::D3, UVec3::new(width, height, depth), format, usage)
    }

    /// Six-layer cube-compatible 2D image.
    #[must_use]
    pub fn cube(size: u32, format: PixelFormat, usage: ImageUsage) -> Self {
        Self::d2(size, size, format, usage)
            .with_layers(6)
            .with_flags(ImageFlags::CUBE_COMPATIBLE)
    }

    #[must_use]
    pub fn with_layers(mut self, array_layers: u32) -> Self {
        self.array_layers = array_layers;
        self
    }

    #[must_use]
    pub fn with_levels(mut self, max_level: u32) -> Self {
        self.max_level = max_level;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ImageFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn with_samples(mut self, samples: SampleCount) -> Self {
        self.samples = samples;
        self
    }

    /// Length of a full mip chain for the current dimension.
    #[must_use]
    pub fn full_mip_chain(&self) -> u32 {
        let largest = self.dimension.max_element().max(1);
        u32::BITS - largest.leading_zeros()
    }

    /// Clamps every field into a consistent state.
    pub fn validate(&mut self) {
        self.dimension = self.dimension.max(UVec3::ONE);

        match self.image_type {
            ImageDim::D1 => {
                self.dimension.y = 1;
                self.dimension.z = 1;
            }
            ImageDim::D2 => self.dimension.z = 1,
            ImageDim::D3 => self.array_layers = 1,
        }

        self.array_layers = self.array_layers.max(1);
        self.max_level = self.max_level.clamp(1, self.full_mip_chain());

        // multisampled images have a single level
        if self.samples.get() > 1 {
            self.max_level = 1;
        }
    }

    /// Returns `true` when no usage bit lets the GPU write into the image.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        !self.usage.intersects(ImageUsage::WRITE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_clamps_levels_to_mip_chain() {
        let mut desc = ImageDesc::d2(256, 128, PixelFormat::RGBA8_UNorm, ImageUsage::SAMPLED).with_levels(100);
        desc.validate();
        assert_eq!(desc.max_level, 9);
    }

    #[test]
    fn validate_flattens_lower_dimensions() {
        let mut desc = ImageDesc::new(ImageDim::D1, UVec3::new(64, 8, 4), PixelFormat::R8_UNorm, ImageUsage::SAMPLED);
        desc.validate();
        assert_eq!(desc.dimension, UVec3::new(64, 1, 1));

        let mut desc = ImageDesc::d3(16, 16, 16, PixelFormat::R8_UNorm, ImageUsage::SAMPLED).with_layers(4);
        desc.validate();
        assert_eq!(desc.array_layers, 1);
    }

    #[test]
    fn validate_forces_single_level_when_multisampled() {
        let mut desc = ImageDesc::d2(64, 64, PixelFormat::RGBA8_UNorm, ImageUsage::COLOR_ATTACHMENT)
            .with_levels(4)
            .with_samples(SampleCount::new(4));
        desc.validate();
        assert_eq!(desc.max_level, 1);
    }

    #[test]
    fn read_only_ignores_read_usages() {
        let sampled = ImageDesc::d2(4, 4, PixelFormat::RGBA8_UNorm, ImageUsage::SAMPLED | ImageUsage::TRANSFER_SRC);
        assert!(sampled.is_read_only());
        let target = ImageDesc::d2(4, 4, PixelFormat::RGBA8_UNorm, ImageUsage::SAMPLED | ImageUsage::COLOR_ATTACHMENT);
        assert!(!target.is_read_only());
    }
}
