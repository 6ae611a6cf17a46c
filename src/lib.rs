#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Resource binding and object caching for a Vulkan frame graph.
//!
//! - [`core`]: ids, native handles, formats, flag sets and the error type
//! - [`resources`]: image and view descriptors, uniform layouts, binding
//!   tables and the descriptor set cache
//! - [`vulkan`]: capability validation, image lifecycle and view caching
//!
//! Most users only need the [`prelude`].

pub use fgcache_core as core;
pub use fgcache_resources as resources;
pub use fgcache_vulkan as vulkan;

pub use fgcache_core::{FgError, Result};
pub use fgcache_resources::{
    BindingTable, DescriptorSetCache, ImageDesc, ImageViewDesc, PipelineResourceSet, UniformLayout,
};
pub use fgcache_vulkan::{Device, DeviceCaps, ExternalImageDesc, Image, ResourceSettings, ValidationMode};

pub mod prelude {
    pub use fgcache_core::config::{REMAINING, WHOLE_SIZE};
    pub use fgcache_core::{
        DescriptorSetId, FgError, ImageAspect, ImageDim, ImageFlags, ImageHandle, ImageLayout, ImageUsage, ImageViewHandle,
        ImageViewType, MemoryType, PixelFormat, QueueFamilyMask, RawBufferId, RawImageId, RawMemoryId,
        RawPipelineResourcesId, RawSamplerId, Result, SampleCount, UniformId,
    };
    pub use fgcache_resources::{
        BindingTable, BufferBinding, DescriptorSetCache, ImageDesc, ImageViewDesc, PipelineResourceSet, Swizzle,
        SwizzleComponent, UniformLayout,
    };
    pub use fgcache_vulkan::{
        Device, DeviceCaps, ExternalImageDesc, Image, MemoryService, NativeDevice, ResourceSettings,
        ValidationMode,
    };
}
