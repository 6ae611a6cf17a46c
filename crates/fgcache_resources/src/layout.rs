//! Uniform layout
//!
//! A [`UniformLayout`] is the shader-reflected description of one descriptor
//! set: every named uniform, its binding indices and the kind of resource it
//! expects. Layouts are immutable once built and shared between binding
//! tables through an `Arc`.

use std::sync::Arc;

use fgcache_core::UniformId;
use fgcache_core::config::MAX_BUFFER_DYNAMIC_OFFSETS;
use rustc_hash::FxHashMap;

/// Binding position of a uniform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingIndex {
    /// Native binding number inside the descriptor set.
    pub vk: u32,
    /// Dense position of the uniform inside its layout.
    pub unique: u32,
}

/// Category of resource a slot holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Image,
    Texture,
    Sampler,
    SubpassInput,
}

/// Reflection data of one uniform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UniformData {
    Image,
    Texture,
    SubpassInput {
        attachment_index: u32,
    },
    Sampler,
    UniformBuffer {
        size: u64,
        dynamic_offset_index: Option<u32>,
    },
    StorageBuffer {
        static_size: u64,
        array_stride: u64,
        dynamic_offset_index: Option<u32>,
    },
}

impl UniformData {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Image => ResourceKind::Image,
            Self::Texture => ResourceKind::Texture,
            Self::SubpassInput { .. } => ResourceKind::SubpassInput,
            Self::Sampler => ResourceKind::Sampler,
            Self::UniformBuffer { .. } | Self::StorageBuffer { .. } => ResourceKind::Buffer,
        }
    }

    #[must_use]
    pub fn dynamic_offset_index(&self) -> Option<u32> {
        match self {
            Self::UniformBuffer { dynamic_offset_index, .. } | Self::StorageBuffer { dynamic_offset_index, .. } => {
                *dynamic_offset_index
            }
            _ => None,
        }
    }
}

/// A named uniform of a layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Uniform {
    pub name: String,
    pub index: BindingIndex,
    pub data: UniformData,
}

/// Immutable set of uniforms making up one descriptor set.
#[derive(Debug, Default)]
pub struct UniformLayout {
    uniforms: Vec<Uniform>,
    lookup: FxHashMap<UniformId, usize>,
    dynamic_offset_count: usize,
}

impl UniformLayout {
    #[must_use]
    pub fn builder() -> UniformLayoutBuilder {
        UniformLayoutBuilder::default()
    }

    #[must_use]
    pub fn get(&self, id: UniformId) -> Option<&Uniform> {
        self.lookup.get(&id).map(|&i| &self.uniforms[i])
    }

    /// Uniforms ordered by their unique index.
    pub fn iter(&self) -> impl Iterator<Item = &Uniform> {
        self.uniforms.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.uniforms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uniforms.is_empty()
    }

    /// Length of the dynamic-offset array of tables built on this layout.
    #[must_use]
    pub fn dynamic_offset_count(&self) -> usize {
        self.dynamic_offset_count
    }
}

/// Builder for [`UniformLayout`]. Unique indices follow insertion order.
#[derive(Debug, Default)]
pub struct UniformLayoutBuilder {
    uniforms: Vec<Uniform>,
}

impl UniformLayoutBuilder {
    fn push(mut self, name: &str, binding: u32, data: UniformData) -> Self {
        let unique = u32::try_from(self.uniforms.len()).unwrap_or(u32::MAX);
        self.uniforms.push(Uniform {
            name: name.to_owned(),
            index: BindingIndex { vk: binding, unique },
            data,
        });
        self
    }

    #[must_use]
    pub fn image(self, name: &str, binding: u32) -> Self {
        self.push(name, binding, UniformData::Image)
    }

    #[must_use]
    pub fn texture(self, name: &str, binding: u32) -> Self {
        self.push(name, binding, UniformData::Texture)
    }

    #[must_use]
    pub fn subpass_input(self, name: &str, binding: u32, attachment_index: u32) -> Self {
        self.push(name, binding, UniformData::SubpassInput { attachment_index })
    }

    #[must_use]
    pub fn sampler(self, name: &str, binding: u32) -> Self {
        self.push(name, binding, UniformData::Sampler)
    }

    #[must_use]
    pub fn uniform_buffer(self, name: &str, binding: u32, size: u64, dynamic_offset_index: Option<u32>) -> Self {
        self.push(name, binding, UniformData::UniformBuffer { size, dynamic_offset_index })
    }

    #[must_use]
    pub fn storage_buffer(
        self,
        name: &str,
        binding: u32,
        static_size: u64,
        array_stride: u64,
        dynamic_offset_index: Option<u32>,
    ) -> Self {
        self.push(name, binding, UniformData::StorageBuffer { static_size, array_stride, dynamic_offset_index })
    }

    /// # Panics
    /// Panics on duplicate names, on a dynamic-offset index outside
    /// `0..MAX_BUFFER_DYNAMIC_OFFSETS` and on two buffers sharing a
    /// dynamic-offset index.
    #[must_use]
    pub fn build(self) -> Arc<UniformLayout> {
        let mut lookup = FxHashMap::default();
        let mut dynamic_used = [false; MAX_BUFFER_DYNAMIC_OFFSETS];
        let mut dynamic_offset_count = 0;

        for (i, uniform) in self.uniforms.iter().enumerate() {
            let previous = lookup.insert(UniformId::new(&uniform.name), i);
            assert!(previous.is_none(), "UniformLayout: duplicate uniform '{}'", uniform.name);

            if let Some(index) = uniform.data.dynamic_offset_index() {
                let index = index as usize;
                assert!(
                    index < MAX_BUFFER_DYNAMIC_OFFSETS,
                    "UniformLayout: dynamic offset index {index} of '{}' exceeds capacity {MAX_BUFFER_DYNAMIC_OFFSETS}",
                    uniform.name
                );
                assert!(
                    !dynamic_used[index],
                    "UniformLayout: dynamic offset index {index} used twice ('{}')",
                    uniform.name
                );
                dynamic_used[index] = true;
                dynamic_offset_count = dynamic_offset_count.max(index + 1);
            }
        }

        Arc::new(UniformLayout {
            uniforms: self.uniforms,
            lookup,
            dynamic_offset_count,
        })
    }
}
