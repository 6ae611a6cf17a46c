//! Backend-independent resource descriptions and binding state: image and
//! view descriptors, uniform layouts, binding tables, the per-pipeline set of
//! tables and the descriptor set cache that re-validates them.

pub mod binding_table;
pub mod descriptor_cache;
pub mod image_desc;
pub mod layout;
pub mod resource_set;
pub mod view_desc;

pub use binding_table::{
    BindingTable, BufferBinding, CachedHandle, ImageBinding, ResourcePayload, ResourceSlot, SamplerBinding,
    SubpassInputBinding, TextureBinding,
};
pub use descriptor_cache::DescriptorSetCache;
pub use image_desc::ImageDesc;
pub use layout::{BindingIndex, ResourceKind, Uniform, UniformData, UniformLayout, UniformLayoutBuilder};
pub use resource_set::PipelineResourceSet;
pub use view_desc::{ImageViewDesc, Swizzle, SwizzleComponent};
