//! Image-related enums and flag sets.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::config::MAX_QUEUE_FAMILIES;

/// Dimensionality of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageDim {
    D1,
    #[default]
    D2,
    D3,
}

/// Type of an image view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageViewType {
    D1,
    D1Array,
    #[default]
    D2,
    D2Array,
    Cube,
    CubeArray,
    D3,
}

/// Layout an image rests in between passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageLayout {
    #[default]
    Undefined,
    General,
    ColorAttachmentOptimal,
    DepthStencilAttachmentOptimal,
    ShaderReadOnlyOptimal,
    TransferSrcOptimal,
    TransferDstOptimal,
    Preinitialized,
}

/// Memory layout strategy of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageTiling {
    Optimal,
    Linear,
}

/// Number of samples per texel.
///
/// Deserialization goes through the same check as [`SampleCount::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SampleCount(u32);

/// A sample count that is not a power of two in `1..=64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("sample count {0} is not a power of two in 1..=64")]
pub struct InvalidSampleCount(pub u32);

impl SampleCount {
    pub const ONE: Self = Self(1);

    /// # Panics
    /// Panics unless `count` is a power of two in `1..=64`.
    #[must_use]
    pub fn new(count: u32) -> Self {
        match Self::try_from(count) {
            Ok(samples) => samples,
            Err(err) => panic!("SampleCount: {err}"),
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn as_flag(self) -> SampleCounts {
        SampleCounts::from_bits_truncate(self.0)
    }
}

impl TryFrom<u32> for SampleCount {
    type Error = InvalidSampleCount;

    fn try_from(count: u32) -> Result<Self, Self::Error> {
        if count.is_power_of_two() && count <= 64 {
            Ok(Self(count))
        } else {
            Err(InvalidSampleCount(count))
        }
    }
}

impl From<SampleCount> for u32 {
    fn from(samples: SampleCount) -> Self {
        samples.0
    }
}

impl Default for SampleCount {
    fn default() -> Self {
        Self::ONE
    }
}

bitflags! {
    /// Set of supported sample counts; bit value equals the count.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SampleCounts: u32 {
        const X1  = 1;
        const X2  = 2;
        const X4  = 4;
        const X8  = 8;
        const X16 = 16;
        const X32 = 32;
        const X64 = 64;
    }
}

bitflags! {
    /// How an image is going to be used.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC             = 1 << 0;
        const TRANSFER_DST             = 1 << 1;
        const SAMPLED                  = 1 << 2;
        const STORAGE                  = 1 << 3;
        const COLOR_ATTACHMENT         = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
        const TRANSIENT_ATTACHMENT     = 1 << 6;
        const INPUT_ATTACHMENT         = 1 << 7;
        const SHADING_RATE             = 1 << 8;
        const SAMPLED_MIN_MAX          = 1 << 9;
        const STORAGE_ATOMIC           = 1 << 10;
        const COLOR_ATTACHMENT_BLEND   = 1 << 11;
    }
}

impl ImageUsage {
    /// Usage bits that let the GPU write into the image.
    pub const WRITE: Self = Self::TRANSFER_DST
        .union(Self::STORAGE)
        .union(Self::COLOR_ATTACHMENT)
        .union(Self::DEPTH_STENCIL_ATTACHMENT)
        .union(Self::TRANSIENT_ATTACHMENT)
        .union(Self::STORAGE_ATOMIC)
        .union(Self::COLOR_ATTACHMENT_BLEND);
}

bitflags! {
    /// Image creation flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ImageFlags: u32 {
        const CUBE_COMPATIBLE             = 1 << 0;
        const ARRAY_2D_COMPATIBLE         = 1 << 1;
        const MUTABLE_FORMAT              = 1 << 2;
        const BLOCK_TEXEL_VIEW_COMPATIBLE = 1 << 3;
    }
}

bitflags! {
    /// Sub-planes of an image.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ImageAspect: u32 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

bitflags! {
    /// Memory access kinds, used for the read-access mask of an image.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        const TRANSFER_READ                  = 1 << 0;
        const SHADER_READ                    = 1 << 1;
        const COLOR_ATTACHMENT_READ          = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT_READ  = 1 << 3;
        const INPUT_ATTACHMENT_READ          = 1 << 4;
        const SHADING_RATE_IMAGE_READ        = 1 << 5;
    }
}

bitflags! {
    /// Visibility class of a memory allocation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MemoryType: u32 {
        const HOST_READ  = 1 << 0;
        const HOST_WRITE = 1 << 1;
        const DEDICATED  = 1 << 2;
    }
}

impl MemoryType {
    #[inline]
    #[must_use]
    pub const fn is_host_visible(self) -> bool {
        self.intersects(Self::HOST_READ.union(Self::HOST_WRITE))
    }

    /// Host-visible memory forces linear tiling.
    #[inline]
    #[must_use]
    pub const fn tiling(self) -> ImageTiling {
        if self.is_host_visible() { ImageTiling::Linear } else { ImageTiling::Optimal }
    }
}

/// Set of queue families, bit `i` standing for family index `i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QueueFamilyMask(u32);

impl QueueFamilyMask {
    pub const EMPTY: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// # Panics
    /// Panics if `index` does not fit the mask.
    #[must_use]
    pub fn with(self, index: u32) -> Self {
        assert!(index < MAX_QUEUE_FAMILIES, "QueueFamilyMask: family index {index} out of range");
        Self(self.0 | (1 << index))
    }

    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Family indices in ascending order.
    pub fn indices(self) -> impl Iterator<Item = u32> {
        (0..MAX_QUEUE_FAMILIES).filter(move |i| self.0 & (1u32 << *i) != 0)
    }
}

impl FromIterator<u32> for QueueFamilyMask {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}
