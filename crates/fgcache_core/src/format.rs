//! Pixel formats and their block layout.

use serde::{Deserialize, Serialize};

use crate::image::ImageAspect;

/// Pixel formats known to the caching layer.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    #[default]
    Unknown,

    // color
    R8_UNorm,
    RG8_UNorm,
    RGBA8_UNorm,
    sRGB8_A8,
    BGRA8_UNorm,
    sBGR8_A8,
    RGB10_A2_UNorm,
    R16F,
    RG16F,
    RGBA16F,
    R32U,
    R32I,
    R32F,
    RG32U,
    RG32F,
    RGBA32U,
    RGBA32F,

    // depth / stencil
    Depth16,
    Depth24,
    Depth32F,
    Depth16_Stencil8,
    Depth24_Stencil8,
    Depth32F_Stencil8,

    // block compressed
    BC1_RGB8_UNorm,
    BC1_RGBA8_UNorm,
    BC3_RGBA8_UNorm,
    BC4_R8_UNorm,
    BC5_RG8_UNorm,
    BC7_RGBA8_UNorm,
    ETC2_RGB8_UNorm,
    ASTC_RGBA_4x4,
    ASTC_RGBA_8x8,
}

/// Value class of a pixel format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Color,
    Depth,
    DepthStencil,
}

/// Block layout of a pixel format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelFormatInfo {
    pub kind: FormatKind,
    /// Bits per block of the color or depth plane.
    pub bits_per_block: u32,
    /// Bits per block of the stencil plane, zero if there is none.
    pub stencil_bits_per_block: u32,
    /// Texel block extent, `(1, 1)` for uncompressed formats.
    pub block_size: (u32, u32),
}

impl PixelFormatInfo {
    const fn color(bits: u32) -> Self {
        Self { kind: FormatKind::Color, bits_per_block: bits, stencil_bits_per_block: 0, block_size: (1, 1) }
    }

    const fn block(bits: u32, w: u32, h: u32) -> Self {
        Self { kind: FormatKind::Color, bits_per_block: bits, stencil_bits_per_block: 0, block_size: (w, h) }
    }

    const fn depth(bits: u32) -> Self {
        Self { kind: FormatKind::Depth, bits_per_block: bits, stencil_bits_per_block: 0, block_size: (1, 1) }
    }

    const fn depth_stencil(bits: u32, stencil: u32) -> Self {
        Self { kind: FormatKind::DepthStencil, bits_per_block: bits, stencil_bits_per_block: stencil, block_size: (1, 1) }
    }

    #[inline]
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        self.block_size.0 > 1 || self.block_size.1 > 1
    }
}

impl PixelFormat {
    /// Every known format, `Unknown` excluded.
    pub const ALL: &'static [PixelFormat] = &[
        Self::R8_UNorm,
        Self::RG8_UNorm,
        Self::RGBA8_UNorm,
        Self::sRGB8_A8,
        Self::BGRA8_UNorm,
        Self::sBGR8_A8,
        Self::RGB10_A2_UNorm,
        Self::R16F,
        Self::RG16F,
        Self::RGBA16F,
        Self::R32U,
        Self::R32I,
        Self::R32F,
        Self::RG32U,
        Self::RG32F,
        Self::RGBA32U,
        Self::RGBA32F,
        Self::Depth16,
        Self::Depth24,
        Self::Depth32F,
        Self::Depth16_Stencil8,
        Self::Depth24_Stencil8,
        Self::Depth32F_Stencil8,
        Self::BC1_RGB8_UNorm,
        Self::BC1_RGBA8_UNorm,
        Self::BC3_RGBA8_UNorm,
        Self::BC4_R8_UNorm,
        Self::BC5_RG8_UNorm,
        Self::BC7_RGBA8_UNorm,
        Self::ETC2_RGB8_UNorm,
        Self::ASTC_RGBA_4x4,
        Self::ASTC_RGBA_8x8,
    ];

    /// Block layout of the format. `Unknown` reports a zero-sized color format.
    #[must_use]
    pub const fn info(self) -> PixelFormatInfo {
        match self {
            Self::Unknown => PixelFormatInfo::color(0),
            Self::R8_UNorm => PixelFormatInfo::color(8),
            Self::RG8_UNorm | Self::R16F => PixelFormatInfo::color(16),
            Self::RGBA8_UNorm
            | Self::sRGB8_A8
            | Self::BGRA8_UNorm
            | Self::sBGR8_A8
            | Self::RGB10_A2_UNorm
            | Self::RG16F
            | Self::R32U
            | Self::R32I
            | Self::R32F => PixelFormatInfo::color(32),
            Self::RGBA16F | Self::RG32U | Self::RG32F => PixelFormatInfo::color(64),
            Self::RGBA32U | Self::RGBA32F => PixelFormatInfo::color(128),

            Self::Depth16 => PixelFormatInfo::depth(16),
            Self::Depth24 => PixelFormatInfo::depth(24),
            Self::Depth32F => PixelFormatInfo::depth(32),
            Self::Depth16_Stencil8 => PixelFormatInfo::depth_stencil(16, 8),
            Self::Depth24_Stencil8 => PixelFormatInfo::depth_stencil(24, 8),
            Self::Depth32F_Stencil8 => PixelFormatInfo::depth_stencil(32, 8),

            Self::BC1_RGB8_UNorm
            | Self::BC1_RGBA8_UNorm
            | Self::BC4_R8_UNorm
            | Self::ETC2_RGB8_UNorm => PixelFormatInfo::block(64, 4, 4),
            Self::BC3_RGBA8_UNorm | Self::BC5_RG8_UNorm | Self::BC7_RGBA8_UNorm | Self::ASTC_RGBA_4x4 => {
                PixelFormatInfo::block(128, 4, 4)
            }
            Self::ASTC_RGBA_8x8 => PixelFormatInfo::block(128, 8, 8),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_color(self) -> bool {
        matches!(self.info().kind, FormatKind::Color)
    }

    #[inline]
    #[must_use]
    pub const fn has_depth(self) -> bool {
        matches!(self.info().kind, FormatKind::Depth | FormatKind::DepthStencil)
    }

    #[inline]
    #[must_use]
    pub const fn has_stencil(self) -> bool {
        matches!(self.info().kind, FormatKind::DepthStencil)
    }

    #[inline]
    #[must_use]
    pub const fn is_compressed(self) -> bool {
        self.info().is_compressed()
    }

    /// Aspects addressed by a whole-resource view of this format.
    #[must_use]
    pub fn aspect_mask(self) -> ImageAspect {
        if self.is_color() {
            return ImageAspect::COLOR;
        }
        let mut aspect = ImageAspect::empty();
        if self.has_depth() {
            aspect |= ImageAspect::DEPTH;
        }
        if self.has_stencil() {
            aspect |= ImageAspect::STENCIL;
        }
        aspect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_follows_format_kind() {
        assert_eq!(PixelFormat::RGBA8_UNorm.aspect_mask(), ImageAspect::COLOR);
        assert_eq!(PixelFormat::Depth32F.aspect_mask(), ImageAspect::DEPTH);
        assert_eq!(
            PixelFormat::Depth24_Stencil8.aspect_mask(),
            ImageAspect::DEPTH | ImageAspect::STENCIL
        );
    }

    #[test]
    fn compressed_formats_report_block_size() {
        let info = PixelFormat::BC1_RGB8_UNorm.info();
        assert!(info.is_compressed());
        assert_eq!(info.block_size, (4, 4));
        assert_eq!(info.bits_per_block, 64);
        assert!(!PixelFormat::RGBA16F.is_compressed());
    }
}
