//! Binding table
//!
//! A [`BindingTable`] holds the resources bound to one descriptor set and
//! tracks whether a previously compiled descriptor object still matches them.
//!
//! # Design
//!
//! 1. **`ResourceSlot`**: one slot per uniform of the layout. The payload
//!    variant is chosen from the layout when the table is built and never
//!    changes; every bind re-hashes the payload.
//! 2. **`CachedHandle`**: a single atomic word holding the id of the compiled
//!    descriptor object, or [`RawPipelineResourcesId::INVALID`].
//! 3. **Invalidation**: a bind that changes a slot's effective payload resets
//!    the cached handle *before* the new payload is stored. A bind with an
//!    identical payload leaves it untouched. Dynamic offsets are supplied at
//!    draw time and never invalidate.
//!
//! Binds take `&mut self`: one logical owner binds, while any thread may read
//! the cached handle through a shared reference.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use fgcache_core::config::{MAX_BUFFER_DYNAMIC_OFFSETS, WHOLE_SIZE};
use fgcache_core::{HashVal, RawBufferId, RawDescriptorSetLayoutId, RawImageId, RawPipelineResourcesId, RawSamplerId, UniformId};
use smallvec::SmallVec;

use crate::layout::{BindingIndex, ResourceKind, Uniform, UniformData, UniformLayout};
use crate::view_desc::ImageViewDesc;

// ============================================================================
// Payloads
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferBinding {
    pub buffer: RawBufferId,
    /// Static offset. Dynamically offset slots keep this at zero.
    pub offset: u64,
    pub size: u64,
}

impl Default for BufferBinding {
    fn default() -> Self {
        Self { buffer: RawBufferId::INVALID, offset: 0, size: WHOLE_SIZE }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImageBinding {
    pub image: RawImageId,
    /// `None` selects the default view of the image.
    pub desc: Option<ImageViewDesc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextureBinding {
    pub image: ImageBinding,
    pub sampler: RawSamplerId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SamplerBinding {
    pub sampler: RawSamplerId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SubpassInputBinding {
    pub image: ImageBinding,
    pub attachment_index: u32,
}

/// Kind-specific content of a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourcePayload {
    Buffer(BufferBinding),
    Image(ImageBinding),
    Texture(TextureBinding),
    Sampler(SamplerBinding),
    SubpassInput(SubpassInputBinding),
}

impl ResourcePayload {
    /// Unbound payload matching the kind declared by `data`.
    fn empty_for(data: &UniformData) -> Self {
        match data {
            UniformData::Image => Self::Image(ImageBinding::default()),
            UniformData::Texture => Self::Texture(TextureBinding::default()),
            UniformData::SubpassInput { attachment_index } => Self::SubpassInput(SubpassInputBinding {
                image: ImageBinding::default(),
                attachment_index: *attachment_index,
            }),
            UniformData::Sampler => Self::Sampler(SamplerBinding::default()),
            UniformData::UniformBuffer { .. } | UniformData::StorageBuffer { .. } => {
                Self::Buffer(BufferBinding::default())
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Image(_) => ResourceKind::Image,
            Self::Texture(_) => ResourceKind::Texture,
            Self::Sampler(_) => ResourceKind::Sampler,
            Self::SubpassInput(_) => ResourceKind::SubpassInput,
        }
    }
}

// ============================================================================
// Slots
// ============================================================================

/// One bound uniform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceSlot {
    index: BindingIndex,
    hash: HashVal,
    payload: ResourcePayload,
}

impl ResourceSlot {
    fn new(uniform: &Uniform) -> Self {
        let payload = ResourcePayload::empty_for(&uniform.data);
        Self { index: uniform.index, hash: HashVal::of(&payload), payload }
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> BindingIndex {
        self.index
    }

    /// Content hash, always equal to `HashVal::of(self.payload())`.
    #[inline]
    #[must_use]
    pub fn hash(&self) -> HashVal {
        self.hash
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> &ResourcePayload {
        &self.payload
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.payload.kind()
    }

    fn rehash(&mut self) {
        self.hash = HashVal::of(&self.payload);
    }

    fn image_mut(&mut self) -> &mut ImageBinding {
        match &mut self.payload {
            ResourcePayload::Image(image) | ResourcePayload::SubpassInput(SubpassInputBinding { image, .. }) => image,
            other => panic!("ResourceSlot: expected an image payload, found {:?}", other.kind()),
        }
    }

    fn texture_mut(&mut self) -> &mut TextureBinding {
        match &mut self.payload {
            ResourcePayload::Texture(texture) => texture,
            other => panic!("ResourceSlot: expected a texture payload, found {:?}", other.kind()),
        }
    }

    fn sampler_mut(&mut self) -> &mut SamplerBinding {
        match &mut self.payload {
            ResourcePayload::Sampler(sampler) => sampler,
            other => panic!("ResourceSlot: expected a sampler payload, found {:?}", other.kind()),
        }
    }

    fn buffer_mut(&mut self) -> &mut BufferBinding {
        match &mut self.payload {
            ResourcePayload::Buffer(buffer) => buffer,
            other => panic!("ResourceSlot: expected a buffer payload, found {:?}", other.kind()),
        }
    }
}

// ============================================================================
// Cached handle
// ============================================================================

/// Atomic id of the compiled descriptor object of a table.
pub struct CachedHandle(AtomicU64);

impl CachedHandle {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(RawPipelineResourcesId::INVALID.to_raw()))
    }

    #[inline]
    #[must_use]
    pub fn load(&self) -> Option<RawPipelineResourcesId> {
        let id = RawPipelineResourcesId::from_raw(self.0.load(Ordering::Acquire));
        id.is_valid().then_some(id)
    }

    #[inline]
    pub fn store(&self, id: RawPipelineResourcesId) {
        self.0.store(id.to_raw(), Ordering::Release);
    }

    #[inline]
    pub fn reset(&self) {
        self.store(RawPipelineResourcesId::INVALID);
    }
}

impl Default for CachedHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CachedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CachedHandle").field(&self.load()).finish()
    }
}

// ============================================================================
// Binding table
// ============================================================================

fn kind_matches(declared: ResourceKind, requested: ResourceKind) -> bool {
    declared == requested || (requested == ResourceKind::Image && declared == ResourceKind::SubpassInput)
}

/// Resources bound to one descriptor set.
#[derive(Debug, Default)]
pub struct BindingTable {
    layout_id: RawDescriptorSetLayoutId,
    uniforms: Option<Arc<UniformLayout>>,
    slots: Vec<ResourceSlot>,
    dynamic_offsets: SmallVec<[u32; MAX_BUFFER_DYNAMIC_OFFSETS]>,
    cached: CachedHandle,
}

impl BindingTable {
    /// Builds one unbound slot per uniform of `uniforms`.
    #[must_use]
    pub fn new(layout_id: RawDescriptorSetLayoutId, uniforms: Arc<UniformLayout>) -> Self {
        let slots = uniforms.iter().map(ResourceSlot::new).collect();
        let dynamic_offsets = SmallVec::from_elem(0, uniforms.dynamic_offset_count());
        Self {
            layout_id,
            uniforms: Some(uniforms),
            slots,
            dynamic_offsets,
            cached: CachedHandle::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn layout_id(&self) -> RawDescriptorSetLayoutId {
        self.layout_id
    }

    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> Option<&Arc<UniformLayout>> {
        self.uniforms.as_ref()
    }

    /// Slots ordered by unique binding index.
    #[inline]
    #[must_use]
    pub fn slots(&self) -> &[ResourceSlot] {
        &self.slots
    }

    #[must_use]
    pub fn slot(&self, id: UniformId) -> Option<&ResourceSlot> {
        let uniform = self.uniform(id)?;
        self.slots.get(uniform.index.unique as usize)
    }

    /// Offsets passed at bind time for dynamically offset buffers.
    #[inline]
    #[must_use]
    pub fn dynamic_offsets(&self) -> &[u32] {
        &self.dynamic_offsets
    }

    /// Hash of the layout id and every slot hash, in slot order.
    #[must_use]
    pub fn content_hash(&self) -> HashVal {
        self.slots
            .iter()
            .fold(HashVal::of(&self.layout_id), |acc, slot| acc.combine(slot.hash))
    }

    // --- Cached compiled handle ---

    /// Id of the compiled descriptor object, `None` once any bind changed the
    /// table since it was stored.
    #[inline]
    #[must_use]
    pub fn cached_handle(&self) -> Option<RawPipelineResourcesId> {
        self.cached.load()
    }

    /// Stores the id of a freshly compiled descriptor object.
    ///
    /// Only the descriptor cache that compiled the object should call this.
    #[inline]
    pub fn set_cached_handle(&self, id: RawPipelineResourcesId) {
        self.cached.store(id);
    }

    /// Forgets the compiled descriptor object.
    #[inline]
    pub fn reset_cached_handle(&self) {
        self.cached.reset();
    }

    // --- Queries ---

    fn uniform(&self, id: UniformId) -> Option<&Uniform> {
        self.uniforms.as_deref()?.get(id)
    }

    /// Whether `id` exists and was declared with a kind matching `kind`.
    /// `Image` also matches subpass inputs.
    #[must_use]
    pub fn has_kind(&self, id: UniformId, kind: ResourceKind) -> bool {
        self.uniform(id).is_some_and(|u| kind_matches(u.data.kind(), kind))
    }

    #[must_use]
    pub fn has_image(&self, id: UniformId) -> bool {
        self.has_kind(id, ResourceKind::Image)
    }

    #[must_use]
    pub fn has_texture(&self, id: UniformId) -> bool {
        self.has_kind(id, ResourceKind::Texture)
    }

    #[must_use]
    pub fn has_sampler(&self, id: UniformId) -> bool {
        self.has_kind(id, ResourceKind::Sampler)
    }

    #[must_use]
    pub fn has_buffer(&self, id: UniformId) -> bool {
        self.has_kind(id, ResourceKind::Buffer)
    }

    // --- Binds ---

    /// Resolves `id` to its slot position and declared data after checking
    /// the declared kind.
    fn declared(&self, id: UniformId, kind: ResourceKind, op: &str) -> (usize, UniformData) {
        match self.uniform(id) {
            Some(u) if kind_matches(u.data.kind(), kind) => (u.index.unique as usize, u.data.clone()),
            Some(u) => panic!("BindingTable: {op}: uniform '{}' is not declared as {kind:?}", u.name),
            None => panic!("BindingTable: {op}: unknown uniform {id}"),
        }
    }

    /// Binds the default view of `image`.
    ///
    /// # Panics
    /// Panics if `id` is not an image or subpass-input uniform.
    pub fn bind_image(&mut self, id: UniformId, image: RawImageId) -> &mut Self {
        self.bind_image_binding(id, ImageBinding { image, desc: None }, "bind_image")
    }

    /// Binds a specific view of `image`.
    ///
    /// # Panics
    /// Panics if `id` is not an image or subpass-input uniform.
    pub fn bind_image_view(&mut self, id: UniformId, image: RawImageId, desc: ImageViewDesc) -> &mut Self {
        self.bind_image_binding(id, ImageBinding { image, desc: Some(desc) }, "bind_image_view")
    }

    fn bind_image_binding(&mut self, id: UniformId, new: ImageBinding, op: &str) -> &mut Self {
        let (unique, _) = self.declared(id, ResourceKind::Image, op);
        let slot = &mut self.slots[unique];
        let current = slot.image_mut();

        if *current != new {
            self.cached.reset();
            *current = new;
            slot.rehash();
        }
        self
    }

    /// Binds the default view of `image` with `sampler`.
    ///
    /// # Panics
    /// Panics if `id` is not a combined image-sampler uniform.
    pub fn bind_texture(&mut self, id: UniformId, image: RawImageId, sampler: RawSamplerId) -> &mut Self {
        let new = TextureBinding { image: ImageBinding { image, desc: None }, sampler };
        self.bind_texture_binding(id, new, "bind_texture")
    }

    /// # Panics
    /// Panics if `id` is not a combined image-sampler uniform.
    pub fn bind_texture_view(
        &mut self,
        id: UniformId,
        image: RawImageId,
        desc: ImageViewDesc,
        sampler: RawSamplerId,
    ) -> &mut Self {
        let new = TextureBinding { image: ImageBinding { image, desc: Some(desc) }, sampler };
        self.bind_texture_binding(id, new, "bind_texture_view")
    }

    fn bind_texture_binding(&mut self, id: UniformId, new: TextureBinding, op: &str) -> &mut Self {
        let (unique, _) = self.declared(id, ResourceKind::Texture, op);
        let slot = &mut self.slots[unique];
        let current = slot.texture_mut();

        if *current != new {
            self.cached.reset();
            *current = new;
            slot.rehash();
        }
        self
    }

    /// # Panics
    /// Panics if `id` is not a sampler uniform.
    pub fn bind_sampler(&mut self, id: UniformId, sampler: RawSamplerId) -> &mut Self {
        let (unique, _) = self.declared(id, ResourceKind::Sampler, "bind_sampler");
        let slot = &mut self.slots[unique];
        let current = slot.sampler_mut();

        if current.sampler != sampler {
            self.cached.reset();
            current.sampler = sampler;
            slot.rehash();
        }
        self
    }

    /// Binds the whole declared range of `buffer`.
    ///
    /// # Panics
    /// Panics if `id` is not a buffer uniform.
    pub fn bind_buffer(&mut self, id: UniformId, buffer: RawBufferId) -> &mut Self {
        self.bind_buffer_range(id, buffer, 0, WHOLE_SIZE)
    }

    /// Binds `size` bytes of `buffer` starting at `offset`. `size` may be
    /// [`WHOLE_SIZE`] to adopt the size declared by the uniform.
    ///
    /// For a dynamically offset uniform, `offset` goes to the dynamic-offset
    /// array and only a change of buffer or size invalidates the table.
    ///
    /// # Panics
    /// Panics if `id` is not a buffer uniform, if `size` does not fit the
    /// declared layout, or if a dynamic offset does not fit in 32 bits.
    pub fn bind_buffer_range(&mut self, id: UniformId, buffer: RawBufferId, offset: u64, size: u64) -> &mut Self {
        let (unique, data) = self.declared(id, ResourceKind::Buffer, "bind_buffer");

        let size = match data {
            UniformData::UniformBuffer { size: declared, .. } => {
                assert!(
                    size == WHOLE_SIZE || size == declared,
                    "BindingTable: bind_buffer: uniform {id} declares {declared} bytes, got {size}"
                );
                declared
            }
            UniformData::StorageBuffer { static_size, array_stride, .. } => {
                assert!(
                    size == WHOLE_SIZE
                        || (size >= static_size && (array_stride == 0 || (size - static_size) % array_stride == 0)),
                    "BindingTable: bind_buffer: size {size} of storage uniform {id} does not match static size {static_size} + n * {array_stride}"
                );
                // runtime arrays keep WHOLE_SIZE and bind to the end of the buffer
                if size == WHOLE_SIZE && array_stride == 0 && static_size > 0 { static_size } else { size }
            }
            _ => unreachable!("has_buffer matched a non-buffer uniform"),
        };

        let slot = &mut self.slots[unique];
        let current = slot.buffer_mut();
        let mut changed = current.buffer != buffer || current.size != size;

        match data.dynamic_offset_index() {
            Some(index) => {
                let offset = u32::try_from(offset)
                    .unwrap_or_else(|_| panic!("BindingTable: bind_buffer: dynamic offset {offset} of {id} exceeds u32"));
                self.dynamic_offsets[index as usize] = offset;
            }
            None => changed |= current.offset != offset,
        }

        if changed {
            self.cached.reset();
            current.buffer = buffer;
            current.size = size;
            if data.dynamic_offset_index().is_none() {
                current.offset = offset;
            }
            slot.rehash();
        }
        self
    }

    /// Moves the static offset of a bound buffer.
    ///
    /// # Panics
    /// Panics if `id` is not a buffer uniform or if it is dynamically offset.
    pub fn rebase_buffer(&mut self, id: UniformId, offset: u64) -> &mut Self {
        let (unique, data) = self.declared(id, ResourceKind::Buffer, "rebase_buffer");
        assert!(
            data.dynamic_offset_index().is_none(),
            "BindingTable: rebase_buffer: uniform {id} uses a dynamic offset"
        );

        let slot = &mut self.slots[unique];
        let current = slot.buffer_mut();
        if current.offset != offset {
            self.cached.reset();
            current.offset = offset;
            slot.rehash();
        }
        self
    }
}
