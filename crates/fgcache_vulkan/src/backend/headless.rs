//! In-process device without a GPU
//!
//! [`HeadlessDevice`] and [`HeadlessMemory`] implement the native seams on top
//! of slot maps. Every call is appended to a shared [`EventLog`], so tests can
//! assert on call order, and the next image, view or bind can be made to fail.
//!
//! Destroying an object the device does not know about panics, which turns
//! double frees into test failures.

use std::sync::Arc;
use std::time::Duration;

use fgcache_core::{
    FgError, ImageHandle, ImageLayout, ImageTiling, ImageViewHandle, MemoryType, ObjectKind, RawMemoryId, Result,
};
use fgcache_resources::{ImageDesc, ImageViewDesc};
use parking_lot::Mutex;
use slotmap::{Key, KeyData, SlotMap, new_key_type};

use crate::caps::DeviceCaps;
use crate::device::{Device, ImageCreateInfo, NativeDevice, SharingMode};
use crate::memory::MemoryService;

new_key_type! {
    struct ImageKey;
    struct ViewKey;
    struct MemoryKey;
}

/// `VK_ERROR_OUT_OF_DEVICE_MEMORY`
const OUT_OF_DEVICE_MEMORY: i32 = -2;

/// A call observed by the headless device or memory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadlessEvent {
    CreateImage(ImageHandle),
    DestroyImage(ImageHandle),
    CreateView { image: ImageHandle, view: ImageViewHandle },
    DestroyView(ImageViewHandle),
    BindMemory { memory: RawMemoryId, image: ImageHandle },
    ReleaseMemory(RawMemoryId),
    SetName { raw: u64, kind: ObjectKind, name: String },
}

/// Call log shared by a device and its memory service.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<HeadlessEvent>>>);

impl EventLog {
    fn push(&self, event: HeadlessEvent) {
        self.0.lock().push(event);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<HeadlessEvent> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Number of recorded events matching `filter`.
    pub fn count(&self, filter: impl Fn(&HeadlessEvent) -> bool) -> usize {
        self.0.lock().iter().filter(|event| filter(event)).count()
    }
}

/// Creation parameters recorded for a live headless image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessImage {
    pub desc: ImageDesc,
    pub tiling: ImageTiling,
    pub initial_layout: ImageLayout,
    pub sharing: SharingMode,
    pub name: Option<String>,
}

#[derive(Debug, Default)]
struct DeviceState {
    images: SlotMap<ImageKey, HeadlessImage>,
    views: SlotMap<ViewKey, (ImageHandle, ImageViewDesc)>,
    fail_next_image: bool,
    fail_next_view: bool,
    view_delay: Option<Duration>,
}

// Occupied slot map keys carry an odd version, so their ffi form is never 0.
fn to_handle<K: Key>(key: K) -> Option<u64> {
    let raw = key.data().as_ffi();
    (raw != 0).then_some(raw)
}

fn from_handle<K: Key + From<KeyData>>(raw: u64) -> K {
    K::from(KeyData::from_ffi(raw))
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    state: Mutex<DeviceState>,
    events: EventLog,
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory service logging into the same event log.
    #[must_use]
    pub fn memory_service(&self) -> HeadlessMemory {
        HeadlessMemory {
            state: Mutex::default(),
            events: self.events.clone(),
        }
    }

    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Makes the next `create_image` call fail.
    pub fn fail_next_image(&self) {
        self.state.lock().fail_next_image = true;
    }

    /// Makes the next `create_image_view` call fail.
    pub fn fail_next_view(&self) {
        self.state.lock().fail_next_view = true;
    }

    /// Stalls every view creation, widening race windows in tests.
    pub fn set_view_delay(&self, delay: Option<Duration>) {
        self.state.lock().view_delay = delay;
    }

    #[must_use]
    pub fn live_images(&self) -> usize {
        self.state.lock().images.len()
    }

    #[must_use]
    pub fn live_views(&self) -> usize {
        self.state.lock().views.len()
    }

    #[must_use]
    pub fn image(&self, image: ImageHandle) -> Option<HeadlessImage> {
        self.state.lock().images.get(from_handle(image.as_raw())).cloned()
    }

    /// Image and normalized descriptor of a live view.
    #[must_use]
    pub fn view(&self, view: ImageViewHandle) -> Option<(ImageHandle, ImageViewDesc)> {
        self.state.lock().views.get(from_handle(view.as_raw())).copied()
    }
}

impl NativeDevice for HeadlessDevice {
    fn create_image(&self, info: &ImageCreateInfo<'_>) -> Result<ImageHandle> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_image) {
            return Err(FgError::NativeCall {
                call: "vkCreateImage",
                code: OUT_OF_DEVICE_MEMORY,
            });
        }

        let key = state.images.insert(HeadlessImage {
            desc: info.desc.clone(),
            tiling: info.tiling,
            initial_layout: info.initial_layout,
            sharing: info.sharing.clone(),
            name: None,
        });
        let handle = to_handle(key).and_then(ImageHandle::from_raw).ok_or(FgError::NativeCall {
            call: "vkCreateImage",
            code: OUT_OF_DEVICE_MEMORY,
        })?;
        drop(state);

        self.events.push(HeadlessEvent::CreateImage(handle));
        Ok(handle)
    }

    fn destroy_image(&self, image: ImageHandle) {
        let removed = self.state.lock().images.remove(from_handle(image.as_raw()));
        assert!(removed.is_some(), "HeadlessDevice: destroying unknown image {image:?}");
        self.events.push(HeadlessEvent::DestroyImage(image));
    }

    fn create_image_view(&self, image: ImageHandle, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        let delay = self.state.lock().view_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_view) {
            return Err(FgError::NativeCall {
                call: "vkCreateImageView",
                code: OUT_OF_DEVICE_MEMORY,
            });
        }
        assert!(
            state.images.contains_key(from_handle(image.as_raw())),
            "HeadlessDevice: view of unknown image {image:?}"
        );

        let key = state.views.insert((image, *desc));
        let view = to_handle(key).and_then(ImageViewHandle::from_raw).ok_or(FgError::NativeCall {
            call: "vkCreateImageView",
            code: OUT_OF_DEVICE_MEMORY,
        })?;
        drop(state);

        self.events.push(HeadlessEvent::CreateView { image, view });
        Ok(view)
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        let removed = self.state.lock().views.remove(from_handle(view.as_raw()));
        assert!(removed.is_some(), "HeadlessDevice: destroying unknown view {view:?}");
        self.events.push(HeadlessEvent::DestroyView(view));
    }

    fn set_object_name(&self, raw: u64, kind: ObjectKind, name: &str) {
        if kind == ObjectKind::Image {
            if let Some(image) = self.state.lock().images.get_mut(from_handle(raw)) {
                image.name = Some(name.to_owned());
            }
        }
        self.events.push(HeadlessEvent::SetName {
            raw,
            kind,
            name: name.to_owned(),
        });
    }
}

#[derive(Debug)]
struct MemoryBlock {
    memory_type: MemoryType,
    bound: Option<ImageHandle>,
}

#[derive(Debug, Default)]
struct MemoryState {
    blocks: SlotMap<MemoryKey, MemoryBlock>,
    fail_next_bind: bool,
}

/// Memory service handing out one block per allocation.
#[derive(Debug, Default)]
pub struct HeadlessMemory {
    state: Mutex<MemoryState>,
    events: EventLog,
}

impl HeadlessMemory {
    #[must_use]
    pub fn allocate(&self, memory_type: MemoryType) -> RawMemoryId {
        let key = self.state.lock().blocks.insert(MemoryBlock {
            memory_type,
            bound: None,
        });
        RawMemoryId::from_raw(key.data().as_ffi())
    }

    #[must_use]
    pub fn is_live(&self, memory: RawMemoryId) -> bool {
        self.state.lock().blocks.contains_key(from_handle(memory.to_raw()))
    }

    #[must_use]
    pub fn bound_image(&self, memory: RawMemoryId) -> Option<ImageHandle> {
        self.state.lock().blocks.get(from_handle(memory.to_raw()))?.bound
    }

    /// Makes the next `bind_image` call fail.
    pub fn fail_next_bind(&self) {
        self.state.lock().fail_next_bind = true;
    }
}

impl MemoryService for HeadlessMemory {
    fn memory_type(&self, memory: RawMemoryId) -> MemoryType {
        self.state
            .lock()
            .blocks
            .get(from_handle(memory.to_raw()))
            .map_or(MemoryType::empty(), |block| block.memory_type)
    }

    fn bind_image(&self, memory: RawMemoryId, image: ImageHandle) -> Result<()> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_bind) {
            return Err(FgError::MemoryBind(format!("injected failure binding {memory:?}")));
        }
        let block = state
            .blocks
            .get_mut(from_handle(memory.to_raw()))
            .ok_or_else(|| FgError::MemoryBind(format!("unknown memory {memory:?}")))?;
        if let Some(bound) = block.bound {
            return Err(FgError::MemoryBind(format!("{memory:?} already backs {bound:?}")));
        }
        block.bound = Some(image);
        drop(state);

        self.events.push(HeadlessEvent::BindMemory { memory, image });
        Ok(())
    }

    fn release(&self, memory: RawMemoryId) {
        let removed = self.state.lock().blocks.remove(from_handle(memory.to_raw()));
        assert!(removed.is_some(), "HeadlessMemory: releasing unknown memory {memory:?}");
        self.events.push(HeadlessEvent::ReleaseMemory(memory));
    }
}

/// A [`Device`] over a fresh headless device, plus handles to inspect it.
#[must_use]
pub fn headless_device(caps: DeviceCaps) -> (Device, Arc<HeadlessDevice>, Arc<HeadlessMemory>) {
    let native = Arc::new(HeadlessDevice::new());
    let memory = Arc::new(native.memory_service());
    let device = Device::new(Arc::clone(&native), Arc::clone(&memory), caps);
    (device, native, memory)
}
