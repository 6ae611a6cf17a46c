//! Image view descriptor
//!
//! [`ImageViewDesc`] selects a sub-range of an image (view type, format, mip
//! and layer range, swizzle and aspect). It is the key of the per-image view
//! cache, so it must be normalized with [`ImageViewDesc::validate`] against
//! the owning [`ImageDesc`] before lookup. A normalized descriptor always
//! names a concrete, non-empty range.

use fgcache_core::config::REMAINING;
use fgcache_core::{ImageAspect, ImageDim, ImageViewType, PixelFormat};

use crate::image_desc::ImageDesc;

/// Source of one output component of a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SwizzleComponent {
    #[default]
    Identity,
    R,
    G,
    B,
    A,
    Zero,
    One,
}

/// Component remapping of a view, in RGBA order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Swizzle(pub [SwizzleComponent; 4]);

impl Swizzle {
    pub const IDENTITY: Self = Self([SwizzleComponent::Identity; 4]);

    #[must_use]
    pub const fn new(r: SwizzleComponent, g: SwizzleComponent, b: SwizzleComponent, a: SwizzleComponent) -> Self {
        Self([r, g, b, a])
    }

    /// Replaces components that map onto themselves with `Identity`.
    #[must_use]
    pub fn normalized(self) -> Self {
        use SwizzleComponent as C;
        let own = [C::R, C::G, C::B, C::A];
        let mut out = self.0;
        for (c, own) in out.iter_mut().zip(own) {
            if *c == own {
                *c = C::Identity;
            }
        }
        Self(out)
    }

    #[must_use]
    pub fn is_identity(self) -> bool {
        self.normalized() == Self::IDENTITY
    }
}

/// Description of a view into an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageViewDesc {
    pub view_type: ImageViewType,
    /// `Unknown` inherits the image format.
    pub format: PixelFormat,
    pub base_level: u32,
    /// [`REMAINING`] selects every level from `base_level` on.
    pub level_count: u32,
    pub base_layer: u32,
    /// [`REMAINING`] selects every layer from `base_layer` on.
    pub layer_count: u32,
    pub swizzle: Swizzle,
    /// Empty selects the aspects of the view format.
    pub aspect_mask: ImageAspect,
}

impl Default for ImageViewDesc {
    fn default() -> Self {
        Self {
            view_type: ImageViewType::D2,
            format: PixelFormat::Unknown,
            base_level: 0,
            level_count: REMAINING,
            base_layer: 0,
            layer_count: REMAINING,
            swizzle: Swizzle::IDENTITY,
            aspect_mask: ImageAspect::empty(),
        }
    }
}

impl ImageViewDesc {
    /// The whole-resource view of `image`: every level and layer, the image
    /// format and the natural view type for its dimension and layer count.
    #[must_use]
    pub fn from_image(image: &ImageDesc) -> Self {
        let view_type = match image.image_type {
            ImageDim::D1 if image.array_layers > 1 => ImageViewType::D1Array,
            ImageDim::D1 => ImageViewType::D1,
            ImageDim::D2 if image.array_layers > 1 => ImageViewType::D2Array,
            ImageDim::D2 => ImageViewType::D2,
            ImageDim::D3 => ImageViewType::D3,
        };
        Self {
            view_type,
            format: image.format,
            base_level: 0,
            level_count: image.max_level,
            base_layer: 0,
            layer_count: image.array_layers,
            swizzle: Swizzle::IDENTITY,
            aspect_mask: image.format.aspect_mask(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, view_type: ImageViewType) -> Self {
        self.view_type = view_type;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_levels(mut self, base_level: u32, level_count: u32) -> Self {
        self.base_level = base_level;
        self.level_count = level_count;
        self
    }

    #[must_use]
    pub fn with_layers(mut self, base_layer: u32, layer_count: u32) -> Self {
        self.base_layer = base_layer;
        self.layer_count = layer_count;
        self
    }

    #[must_use]
    pub fn with_swizzle(mut self, swizzle: Swizzle) -> Self {
        self.swizzle = swizzle;
        self
    }

    #[must_use]
    pub fn with_aspect(mut self, aspect_mask: ImageAspect) -> Self {
        self.aspect_mask = aspect_mask;
        self
    }

    /// Resolves every "inherit" value against `image` and clamps the level
    /// and layer ranges into the image.
    pub fn validate(&mut self, image: &ImageDesc) {
        if self.format == PixelFormat::Unknown {
            self.format = image.format;
        }

        let max_level = image.max_level.max(1);
        self.base_level = self.base_level.min(max_level - 1);
        self.level_count = self.level_count.clamp(1, max_level - self.base_level);

        let max_layers = image.array_layers.max(1);
        self.base_layer = self.base_layer.min(max_layers - 1);
        self.layer_count = match self.view_type {
            ImageViewType::D1 | ImageViewType::D2 | ImageViewType::D3 => 1,
            _ => self.layer_count.clamp(1, max_layers - self.base_layer),
        };

        let available = image.format.aspect_mask();
        self.aspect_mask = if self.aspect_mask.is_empty() {
            self.format.aspect_mask() & available
        } else {
            self.aspect_mask & available
        };
        if self.aspect_mask.is_empty() {
            self.aspect_mask = available;
        }

        self.swizzle = self.swizzle.normalized();
    }

    /// Copy of `self` normalized against `image`.
    #[must_use]
    pub fn validated(mut self, image: &ImageDesc) -> Self {
        self.validate(image);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgcache_core::{ImageFlags, ImageUsage};

    fn array_image() -> ImageDesc {
        let mut desc = ImageDesc::d2(64, 64, PixelFormat::RGBA8_UNorm, ImageUsage::SAMPLED)
            .with_levels(7)
            .with_layers(4);
        desc.validate();
        desc
    }

    #[test]
    fn remaining_ranges_resolve_to_image_extent() {
        let image = array_image();
        let view = ImageViewDesc::default()
            .with_type(ImageViewType::D2Array)
            .with_levels(2, REMAINING)
            .with_layers(1, REMAINING)
            .validated(&image);
        assert_eq!(view.format, PixelFormat::RGBA8_UNorm);
        assert_eq!((view.base_level, view.level_count), (2, 5));
        assert_eq!((view.base_layer, view.layer_count), (1, 3));
        assert_eq!(view.aspect_mask, ImageAspect::COLOR);
    }

    #[test]
    fn single_layer_types_select_one_layer() {
        let image = array_image();
        let view = ImageViewDesc::default().validated(&image);
        assert_eq!(view.layer_count, 1);
    }

    #[test]
    fn out_of_range_base_is_clamped() {
        let image = array_image();
        let view = ImageViewDesc::default().with_levels(40, 3).validated(&image);
        assert_eq!((view.base_level, view.level_count), (6, 1));
    }

    #[test]
    fn from_image_is_stable_under_validation() {
        let mut image = ImageDesc::cube(32, PixelFormat::RGBA16F, ImageUsage::SAMPLED)
            .with_flags(ImageFlags::MUTABLE_FORMAT)
            .with_levels(REMAINING);
        image.validate();
        let view = ImageViewDesc::from_image(&image);
        assert_eq!(view.view_type, ImageViewType::D2Array);
        assert_eq!(view.validated(&image), view);
    }

    #[test]
    fn explicit_aspect_is_limited_to_image_planes() {
        let mut image = ImageDesc::d2(8, 8, PixelFormat::Depth24_Stencil8, ImageUsage::DEPTH_STENCIL_ATTACHMENT);
        image.validate();
        let depth_only = ImageViewDesc::default().with_aspect(ImageAspect::DEPTH).validated(&image);
        assert_eq!(depth_only.aspect_mask, ImageAspect::DEPTH);
        let color = ImageViewDesc::default().with_aspect(ImageAspect::COLOR).validated(&image);
        assert_eq!(color.aspect_mask, ImageAspect::DEPTH | ImageAspect::STENCIL);
    }

    #[test]
    fn equivalent_swizzles_compare_equal_after_validation() {
        use SwizzleComponent as C;
        let image = array_image();
        let explicit = ImageViewDesc::default()
            .with_swizzle(Swizzle::new(C::R, C::G, C::B, C::A))
            .validated(&image);
        let identity = ImageViewDesc::default().validated(&image);
        assert_eq!(explicit, identity);
    }
}
