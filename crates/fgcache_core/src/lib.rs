//! Foundational types shared by the fgcache crates: raw resource ids, opaque
//! native handles, pixel formats, image flag sets, content hashing, limits and
//! the error type.

pub mod config;
pub mod errors;
pub mod format;
pub mod handles;
pub mod hash;
pub mod ids;
pub mod image;

pub use errors::{FgError, Result};
pub use format::{FormatKind, PixelFormat, PixelFormatInfo};
pub use handles::{ImageHandle, ImageViewHandle, ObjectKind};
pub use hash::HashVal;
pub use ids::{
    DescriptorSetId, RawBufferId, RawDescriptorSetLayoutId, RawImageId, RawMemoryId,
    RawPipelineResourcesId, RawSamplerId, UniformId,
};
pub use image::{
    AccessFlags, ImageAspect, ImageDim, ImageFlags, ImageLayout, ImageTiling, ImageUsage,
    ImageViewType, InvalidSampleCount, MemoryType, QueueFamilyMask, SampleCount, SampleCounts,
};
