//! Device capability snapshot
//!
//! [`DeviceCaps`] is the read-only view of the device that the capability
//! validator works on: feature switches, supported image creation flags and,
//! per pixel format and tiling mode, the format features and image limits.
//!
//! A snapshot comes from one of three places:
//! - [`DeviceCaps::query`] on a physical device (`vulkan` feature)
//! - [`DeviceCaps::from_json`] for a recorded device profile
//! - [`DeviceCaps::headless`] for a permissive in-process device

use std::collections::BTreeMap;

use bitflags::bitflags;
use fgcache_core::{ImageDim, ImageFlags, ImageTiling, PixelFormat, Result, SampleCounts};
use glam::UVec3;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Operations a format supports for one tiling mode.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct FormatFeatures: u32 {
        const SAMPLED_IMAGE               = 1 << 0;
        const SAMPLED_IMAGE_FILTER_LINEAR = 1 << 1;
        const SAMPLED_IMAGE_FILTER_MINMAX = 1 << 2;
        const STORAGE_IMAGE               = 1 << 3;
        const STORAGE_IMAGE_ATOMIC        = 1 << 4;
        const COLOR_ATTACHMENT            = 1 << 5;
        const COLOR_ATTACHMENT_BLEND      = 1 << 6;
        const DEPTH_STENCIL_ATTACHMENT    = 1 << 7;
        const BLIT_SRC                    = 1 << 8;
        const BLIT_DST                    = 1 << 9;
        const TRANSFER_SRC                = 1 << 10;
        const TRANSFER_DST                = 1 << 11;
    }
}

/// Optional device features the validator cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceFeatures {
    pub image_cube_array: bool,
    pub shading_rate_image: bool,
}

/// Image limits of one format and tiling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageFormatLimits {
    pub max_extent: UVec3,
    pub max_mip_levels: u32,
    pub max_array_layers: u32,
    pub sample_counts: SampleCounts,
}

impl Default for ImageFormatLimits {
    fn default() -> Self {
        Self {
            max_extent: UVec3::ZERO,
            max_mip_levels: 0,
            max_array_layers: 0,
            sample_counts: SampleCounts::empty(),
        }
    }
}

/// Features and limits of one format and tiling mode.
///
/// `limits` describes 2D images. 1D and 3D images use their own entry when
/// present and fall back to `limits` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingCaps {
    pub features: FormatFeatures,
    pub limits: ImageFormatLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits_1d: Option<ImageFormatLimits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits_3d: Option<ImageFormatLimits>,
}

impl TilingCaps {
    #[must_use]
    pub fn limits_for(&self, dim: ImageDim) -> &ImageFormatLimits {
        let specific = match dim {
            ImageDim::D1 => self.limits_1d.as_ref(),
            ImageDim::D2 => None,
            ImageDim::D3 => self.limits_3d.as_ref(),
        };
        specific.unwrap_or(&self.limits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatCaps {
    pub optimal: TilingCaps,
    pub linear: TilingCaps,
}

impl FormatCaps {
    #[must_use]
    pub fn tiling(&self, tiling: ImageTiling) -> &TilingCaps {
        match tiling {
            ImageTiling::Optimal => &self.optimal,
            ImageTiling::Linear => &self.linear,
        }
    }
}

/// Read-only snapshot of the device capabilities.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceCaps {
    pub features: DeviceFeatures,
    /// Creation flags the device accepts.
    pub image_create_flags: ImageFlags,
    /// Formats missing from the map are unsupported.
    pub formats: BTreeMap<PixelFormat, FormatCaps>,
}

impl DeviceCaps {
    /// Parses a JSON device profile.
    ///
    /// # Errors
    /// Returns [`FgError::DeviceProfile`](fgcache_core::FgError::DeviceProfile)
    /// if the profile is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// Returns [`FgError::DeviceProfile`](fgcache_core::FgError::DeviceProfile)
    /// if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Caps of `format` for `tiling`, `None` if the format is unknown.
    #[must_use]
    pub fn tiling(&self, format: PixelFormat, tiling: ImageTiling) -> Option<&TilingCaps> {
        self.formats.get(&format).map(|caps| caps.tiling(tiling))
    }

    /// A permissive device: every feature, every creation flag and the usual
    /// desktop-class format support for every known format.
    #[must_use]
    pub fn headless() -> Self {
        let formats = PixelFormat::ALL
            .iter()
            .map(|&format| (format, headless_format_caps(format)))
            .collect();
        Self {
            features: DeviceFeatures {
                image_cube_array: true,
                shading_rate_image: true,
            },
            image_create_flags: ImageFlags::all(),
            formats,
        }
    }
}

fn headless_format_caps(format: PixelFormat) -> FormatCaps {
    let transfer = FormatFeatures::TRANSFER_SRC | FormatFeatures::TRANSFER_DST | FormatFeatures::BLIT_SRC;
    let sampled = FormatFeatures::SAMPLED_IMAGE | FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR;

    let optimal = if format.is_compressed() {
        transfer | sampled
    } else if format.has_depth() {
        transfer | sampled | FormatFeatures::DEPTH_STENCIL_ATTACHMENT
    } else {
        let mut features = transfer
            | sampled
            | FormatFeatures::SAMPLED_IMAGE_FILTER_MINMAX
            | FormatFeatures::STORAGE_IMAGE
            | FormatFeatures::COLOR_ATTACHMENT
            | FormatFeatures::COLOR_ATTACHMENT_BLEND
            | FormatFeatures::BLIT_DST;
        if matches!(format, PixelFormat::R32U | PixelFormat::R32I) {
            features |= FormatFeatures::STORAGE_IMAGE_ATOMIC;
        }
        features
    };

    // linear images are plain 2D transfer/sample targets
    let linear = if format.is_color() && !format.is_compressed() {
        FormatFeatures::TRANSFER_SRC | FormatFeatures::TRANSFER_DST | sampled
    } else {
        FormatFeatures::empty()
    };

    FormatCaps {
        optimal: TilingCaps {
            features: optimal,
            limits: ImageFormatLimits {
                max_extent: UVec3::new(16384, 16384, 1),
                max_mip_levels: 15,
                max_array_layers: 2048,
                sample_counts: SampleCounts::X1 | SampleCounts::X2 | SampleCounts::X4 | SampleCounts::X8,
            },
            limits_1d: Some(ImageFormatLimits {
                max_extent: UVec3::new(16384, 1, 1),
                max_mip_levels: 15,
                max_array_layers: 2048,
                sample_counts: SampleCounts::X1,
            }),
            limits_3d: (!format.has_depth()).then_some(ImageFormatLimits {
                max_extent: UVec3::splat(2048),
                max_mip_levels: 12,
                max_array_layers: 1,
                sample_counts: SampleCounts::X1,
            }),
        },
        linear: TilingCaps {
            features: linear,
            limits: ImageFormatLimits {
                max_extent: UVec3::new(16384, 16384, 1),
                max_mip_levels: 1,
                max_array_layers: 1,
                sample_counts: SampleCounts::X1,
            },
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_supports_color_attachments() {
        let caps = DeviceCaps::headless();
        let optimal = caps.tiling(PixelFormat::RGBA8_UNorm, ImageTiling::Optimal).unwrap();
        assert!(optimal.features.contains(FormatFeatures::COLOR_ATTACHMENT | FormatFeatures::SAMPLED_IMAGE));
        let depth = caps.tiling(PixelFormat::Depth32F, ImageTiling::Optimal).unwrap();
        assert!(!depth.features.contains(FormatFeatures::COLOR_ATTACHMENT));
    }

    #[test]
    fn json_profile_round_trips() {
        let caps = DeviceCaps::headless();
        let json = caps.to_json().unwrap();
        assert_eq!(DeviceCaps::from_json(&json).unwrap(), caps);
    }

    #[test]
    fn partial_profile_leaves_formats_unsupported() {
        let caps = DeviceCaps::from_json(
            r#"{
                "features": { "image_cube_array": true },
                "formats": {
                    "RGBA8_UNorm": { "optimal": { "features": "SAMPLED_IMAGE | TRANSFER_DST" } }
                }
            }"#,
        )
        .unwrap();
        assert!(caps.features.image_cube_array);
        assert!(!caps.features.shading_rate_image);
        assert!(caps.tiling(PixelFormat::RGBA16F, ImageTiling::Optimal).is_none());
        let rgba8 = caps.tiling(PixelFormat::RGBA8_UNorm, ImageTiling::Optimal).unwrap();
        assert_eq!(rgba8.features, FormatFeatures::SAMPLED_IMAGE | FormatFeatures::TRANSFER_DST);
        assert_eq!(rgba8.limits.max_mip_levels, 0);
    }

    #[test]
    fn per_dimension_limits_fall_back_to_2d() {
        let caps = DeviceCaps::from_json(
            r#"{
                "formats": {
                    "R8_UNorm": { "optimal": {
                        "features": "SAMPLED_IMAGE",
                        "limits": { "max_extent": [4096, 4096, 1], "max_mip_levels": 13, "max_array_layers": 64, "sample_counts": "X1 | X4" },
                        "limits_3d": { "max_extent": [512, 512, 512], "max_mip_levels": 10, "max_array_layers": 1, "sample_counts": "X1" }
                    } }
                }
            }"#,
        )
        .unwrap();
        let optimal = caps.tiling(PixelFormat::R8_UNorm, ImageTiling::Optimal).unwrap();
        assert_eq!(optimal.limits_for(ImageDim::D3).max_extent, UVec3::splat(512));
        assert_eq!(optimal.limits_for(ImageDim::D2).max_extent.z, 1);
        assert_eq!(optimal.limits_for(ImageDim::D1), &optimal.limits);
    }

    #[test]
    fn headless_depth_formats_have_no_volume_limits() {
        let caps = DeviceCaps::headless();
        let depth = caps.tiling(PixelFormat::Depth32F, ImageTiling::Optimal).unwrap();
        assert!(depth.limits_3d.is_none());
        let color = caps.tiling(PixelFormat::RGBA8_UNorm, ImageTiling::Optimal).unwrap();
        assert_eq!(color.limits_for(ImageDim::D3).max_extent.z, 2048);
    }

    #[test]
    fn malformed_profile_is_an_error() {
        assert!(DeviceCaps::from_json("{ not json").is_err());
    }
}
