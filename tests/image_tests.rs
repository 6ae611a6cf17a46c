//! Image Lifecycle Tests
//!
//! Tests for:
//! - Image::create: tiling, initial layout, sharing mode and debug names
//! - Failure paths: native create, memory bind and view creation leave nothing behind
//! - Validation modes: strict rejection versus warn-and-continue
//! - Image::destroy: views first, then the image, then the memory
//! - Adopted images: release callback instead of native destroy, description round trip
//! - View cache: normalization, dedup under contention
//! - Frame scenario: render target, shared default view, binding table invalidation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use fgcache::core::{AccessFlags, ImageTiling, RawDescriptorSetLayoutId};
use fgcache::prelude::*;
use fgcache::vulkan::{ImageCreateInfo, SharingMode};
use fgcache::vulkan::backend::{HeadlessDevice, HeadlessEvent, HeadlessMemory, headless_device};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup() -> (Device, Arc<HeadlessDevice>, Arc<HeadlessMemory>) {
    init_logger();
    headless_device(DeviceCaps::headless())
}

fn render_target() -> ImageDesc {
    ImageDesc::d2(256, 256, PixelFormat::RGBA8_UNorm, ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED)
}

fn create(device: &Device, memory: &HeadlessMemory, desc: &ImageDesc, name: &str) -> Image {
    let image = Image::new();
    let mem = memory.allocate(MemoryType::empty());
    image
        .create(device, desc, mem, QueueFamilyMask::EMPTY, ImageLayout::Undefined, name)
        .expect("image creation succeeds");
    image
}

fn is_create_view(event: &HeadlessEvent) -> bool {
    matches!(event, HeadlessEvent::CreateView { .. })
}

// ============================================================================
// Creation Tests
// ============================================================================

#[test]
fn create_records_optimal_tiling_and_undefined_layout() {
    let (device, native, memory) = setup();
    let image = create(&device, &memory, &render_target(), "scene_color");

    let handle = image.handle().unwrap();
    let info = native.image(handle).unwrap();
    assert_eq!(info.tiling, ImageTiling::Optimal);
    assert_eq!(info.initial_layout, ImageLayout::Undefined);
    assert_eq!(info.sharing, SharingMode::Exclusive);
    assert_eq!(info.name.as_deref(), Some("scene_color"));
    assert_eq!(memory.bound_image(image.memory().unwrap()), Some(handle));

    image.destroy(&device);
}

#[test]
fn host_visible_memory_creates_linear_preinitialized_image() {
    let (device, native, memory) = setup();
    let image = Image::new();
    let mem = memory.allocate(MemoryType::HOST_WRITE);
    let desc = ImageDesc::d2(64, 64, PixelFormat::RGBA8_UNorm, ImageUsage::SAMPLED);
    image
        .create(&device, &desc, mem, QueueFamilyMask::EMPTY, ImageLayout::Undefined, "upload")
        .unwrap();

    let info = native.image(image.handle().unwrap()).unwrap();
    assert_eq!(info.tiling, ImageTiling::Linear);
    assert_eq!(info.initial_layout, ImageLayout::Preinitialized);
    image.destroy(&device);
}

#[test]
fn two_queue_families_enable_concurrent_sharing() {
    let (device, native, memory) = setup();
    let image = Image::new();
    let families: QueueFamilyMask = [0, 2].into_iter().collect();
    image
        .create(
            &device,
            &render_target(),
            memory.allocate(MemoryType::empty()),
            families,
            ImageLayout::Undefined,
            "shared",
        )
        .unwrap();

    let info = native.image(image.handle().unwrap()).unwrap();
    assert_eq!(info.sharing.queue_family_indices(), &[0, 2]);
    assert_eq!(image.queue_families(), families);
    image.destroy(&device);
}

#[test]
fn descriptor_is_validated_on_create() {
    let (device, _native, memory) = setup();
    let desc = ImageDesc::d2(300, 0, PixelFormat::RGBA8_UNorm, ImageUsage::SAMPLED).with_levels(99);
    let image = create(&device, &memory, &desc, "clamped");

    let stored = image.desc();
    assert_eq!(stored.dimension.y, 1);
    assert_eq!(stored.max_level, stored.full_mip_chain());
    image.destroy(&device);
}

#[test]
fn derived_state_follows_usage() {
    let (device, _native, memory) = setup();

    let depth = ImageDesc::d2(
        128,
        128,
        PixelFormat::Depth24_Stencil8,
        ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::SAMPLED,
    );
    let image = create(&device, &memory, &depth, "depth");
    assert_eq!(image.default_layout(), ImageLayout::DepthStencilAttachmentOptimal);
    assert_eq!(image.aspect_mask(), ImageAspect::DEPTH | ImageAspect::STENCIL);
    assert_eq!(
        image.read_access_mask(),
        AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::SHADER_READ
    );
    assert!(!image.is_read_only());
    image.destroy(&device);

    let texture = ImageDesc::d2(128, 128, PixelFormat::BC7_RGBA8_UNorm, ImageUsage::SAMPLED);
    let image = create(&device, &memory, &texture, "albedo");
    assert_eq!(image.default_layout(), ImageLayout::ShaderReadOnlyOptimal);
    assert!(image.is_read_only());
    image.destroy(&device);
}

#[test]
fn explicit_default_layout_wins() {
    let (device, _native, memory) = setup();
    let image = Image::new();
    image
        .create(
            &device,
            &render_target(),
            memory.allocate(MemoryType::empty()),
            QueueFamilyMask::EMPTY,
            ImageLayout::TransferSrcOptimal,
            "readback",
        )
        .unwrap();
    assert_eq!(image.default_layout(), ImageLayout::TransferSrcOptimal);
    image.destroy(&device);
}

#[test]
fn debug_names_can_be_disabled() {
    init_logger();
    let (device, native, memory) = headless_device(DeviceCaps::headless());
    let device = device.with_settings(ResourceSettings {
        debug_names: false,
        ..Default::default()
    });
    let image = create(&device, &memory, &render_target(), "hidden");

    assert_eq!(native.image(image.handle().unwrap()).unwrap().name, None);
    assert_eq!(native.events().count(|e| matches!(e, HeadlessEvent::SetName { .. })), 0);
    assert_eq!(image.debug_name(), "hidden");
    image.destroy(&device);
}

#[test]
#[should_panic(expected = "already created")]
fn double_create_is_a_contract_violation() {
    let (device, _native, memory) = setup();
    let image = create(&device, &memory, &render_target(), "twice");
    let _ = image.create(
        &device,
        &render_target(),
        memory.allocate(MemoryType::empty()),
        QueueFamilyMask::EMPTY,
        ImageLayout::Undefined,
        "twice",
    );
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn native_create_failure_leaves_image_uncreated() {
    let (device, native, memory) = setup();
    native.fail_next_image();

    let image = Image::new();
    let mem = memory.allocate(MemoryType::empty());
    let result = image.create(&device, &render_target(), mem, QueueFamilyMask::EMPTY, ImageLayout::Undefined, "x");

    assert!(matches!(result, Err(FgError::NativeCall { call: "vkCreateImage", .. })));
    assert!(!image.is_created());
    assert_eq!(memory.bound_image(mem), None);
}

#[test]
fn bind_failure_destroys_the_new_image() {
    let (device, native, memory) = setup();
    memory.fail_next_bind();

    let image = Image::new();
    let mem = memory.allocate(MemoryType::empty());
    let result = image.create(&device, &render_target(), mem, QueueFamilyMask::EMPTY, ImageLayout::Undefined, "x");

    assert!(matches!(result, Err(FgError::MemoryBind(_))));
    assert!(!image.is_created());
    assert_eq!(native.live_images(), 0);
    let events = native.events().snapshot();
    assert!(matches!(events.as_slice(), [HeadlessEvent::CreateImage(a), HeadlessEvent::DestroyImage(b)] if a == b));
}

#[test]
fn strict_validation_rejects_unsupported_image() {
    init_logger();
    let (device, native, memory) = headless_device(DeviceCaps::default());

    let image = Image::new();
    let result = image.create(
        &device,
        &render_target(),
        memory.allocate(MemoryType::empty()),
        QueueFamilyMask::EMPTY,
        ImageLayout::Undefined,
        "unsupported",
    );
    assert!(matches!(result, Err(FgError::UnsupportedImage(_))));
    assert_eq!(native.live_images(), 0);
}

#[test]
fn warn_validation_forwards_unsupported_image() {
    init_logger();
    let (device, native, memory) = headless_device(DeviceCaps::default());
    let device = device.with_settings(ResourceSettings {
        validation: ValidationMode::Warn,
        ..Default::default()
    });

    let image = create(&device, &memory, &render_target(), "forwarded");
    assert_eq!(native.live_images(), 1);
    image.destroy(&device);
}

#[test]
fn failed_view_is_not_cached() {
    let (device, native, memory) = setup();
    let image = create(&device, &memory, &render_target(), "flaky");

    native.fail_next_view();
    assert!(image.get_default_view(&device).is_err());
    assert_eq!(image.view_count(), 0);

    let view = image.get_default_view(&device).unwrap();
    assert_eq!(image.get_default_view(&device).unwrap(), view);
    assert_eq!(image.view_count(), 1);
    image.destroy(&device);
}

#[test]
fn failed_view_leaves_other_views_intact() {
    let (device, native, memory) = setup();
    let image = create(&device, &memory, &render_target().with_levels(4), "mipped");

    let default = image.get_default_view(&device).unwrap();
    let second_mip = ImageViewDesc::default().with_levels(1, 1);

    native.fail_next_view();
    assert!(image.get_view(&device, &second_mip).is_err());
    assert_eq!(image.view_count(), 1);
    assert_eq!(native.live_views(), 1);
    assert_eq!(image.get_default_view(&device).unwrap(), default);

    let retried = image.get_view(&device, &second_mip).unwrap();
    assert_ne!(retried, default);
    assert_eq!(image.view_count(), 2);
    image.destroy(&device);
}

#[test]
fn unsupported_view_is_rejected_before_native_call() {
    init_logger();
    let mut caps = DeviceCaps::headless();
    caps.features.image_cube_array = false;
    let (device, native, memory) = headless_device(caps);

    let desc = ImageDesc::cube(64, PixelFormat::RGBA16F, ImageUsage::SAMPLED).with_layers(12);
    let image = create(&device, &memory, &desc, "probes");
    let view = ImageViewDesc::default().with_type(ImageViewType::CubeArray);

    assert!(matches!(image.get_view(&device, &view), Err(FgError::UnsupportedView(_))));
    assert_eq!(native.events().count(is_create_view), 0);
    image.destroy(&device);
}

#[test]
fn views_of_uncreated_image_fail() {
    let (device, _native, _memory) = setup();
    let image = Image::new();
    assert!(matches!(image.get_default_view(&device), Err(FgError::NotCreated)));
}

// ============================================================================
// Destroy Tests
// ============================================================================

#[test]
fn destroy_releases_views_then_image_then_memory() {
    let (device, native, memory) = setup();
    let desc = render_target().with_levels(4);
    let image = create(&device, &memory, &desc, "mips");
    let handle = image.handle().unwrap();
    let mem = image.memory().unwrap();

    let views = [
        image.get_default_view(&device).unwrap(),
        image.get_view(&device, &ImageViewDesc::default().with_levels(1, 1)).unwrap(),
        image.get_view(&device, &ImageViewDesc::default().with_levels(2, 2)).unwrap(),
    ];
    assert_eq!(image.view_count(), 3);
    native.events().clear();

    image.destroy(&device);

    let events = native.events().snapshot();
    assert_eq!(events.len(), 5);
    for event in &events[..3] {
        let HeadlessEvent::DestroyView(view) = event else {
            panic!("expected a view destroy, got {event:?}");
        };
        assert!(views.contains(view));
    }
    assert_eq!(events[3], HeadlessEvent::DestroyImage(handle));
    assert_eq!(events[4], HeadlessEvent::ReleaseMemory(mem));

    assert!(!image.is_created());
    assert_eq!(image.view_count(), 0);
    assert_eq!(native.live_views(), 0);
    assert!(!memory.is_live(mem));
}

#[test]
fn destroy_is_idempotent() {
    let (device, native, memory) = setup();
    let image = Image::new();
    image.destroy(&device);

    let image = create(&device, &memory, &render_target(), "once");
    image.destroy(&device);
    image.destroy(&device);
    assert_eq!(native.events().count(|e| matches!(e, HeadlessEvent::DestroyImage(_))), 1);
}

#[test]
fn image_can_be_recreated_after_destroy() {
    let (device, _native, memory) = setup();
    let image = create(&device, &memory, &render_target(), "resized");
    image.destroy(&device);

    let bigger = ImageDesc::d2(512, 512, PixelFormat::RGBA8_UNorm, ImageUsage::SAMPLED);
    image
        .create(&device, &bigger, memory.allocate(MemoryType::empty()), QueueFamilyMask::EMPTY, ImageLayout::Undefined, "resized")
        .unwrap();
    assert_eq!(image.desc().dimension.x, 512);
    image.destroy(&device);
}

// ============================================================================
// Adopted Image Tests
// ============================================================================

fn swapchain_image(native: &HeadlessDevice) -> ExternalImageDesc {
    let desc = ImageDesc::d2(1280, 720, PixelFormat::BGRA8_UNorm, ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST);
    let image = native
        .create_image(&ImageCreateInfo {
            desc: &desc,
            tiling: ImageTiling::Optimal,
            initial_layout: ImageLayout::Undefined,
            sharing: SharingMode::Exclusive,
        })
        .unwrap();
    ExternalImageDesc {
        image,
        image_type: ImageDim::D2,
        flags: ImageFlags::empty(),
        usage: desc.usage,
        format: desc.format,
        current_layout: ImageLayout::Undefined,
        default_layout: ImageLayout::Undefined,
        samples: SampleCount::ONE,
        dimension: desc.dimension,
        array_layers: 1,
        max_levels: 1,
        queue_family_indices: Default::default(),
    }
}

#[test]
fn adopted_image_runs_release_callback_instead_of_destroy() {
    let (device, native, _memory) = setup();
    let external = swapchain_image(&native);

    let released = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&released);
    let image = Image::new();
    image
        .create_external(
            &device,
            &external,
            "backbuffer",
            Some(Box::new(move |handle| sink.lock().unwrap().push(handle))),
        )
        .unwrap();

    assert!(image.is_external());
    assert_eq!(image.memory(), None);
    let view = image.get_default_view(&device).unwrap();
    native.events().clear();

    image.destroy(&device);

    assert_eq!(*released.lock().unwrap(), vec![external.image]);
    assert_eq!(native.events().snapshot(), vec![HeadlessEvent::DestroyView(view)]);
    assert_eq!(native.live_images(), 1);
}

#[test]
fn adopted_image_without_callback_destroys_trivially() {
    let (device, native, _memory) = setup();
    let external = swapchain_image(&native);

    let image = Image::new();
    image.create_external(&device, &external, "borrowed", None).unwrap();
    native.events().clear();

    image.destroy(&device);
    assert!(native.events().snapshot().is_empty());
    assert!(!image.is_created());
}

#[test]
fn api_description_round_trips_through_adoption() {
    let (device, native, memory) = setup();
    let owner = Image::new();
    let families: QueueFamilyMask = [1, 3].into_iter().collect();
    owner
        .create(
            &device,
            &render_target().with_levels(3),
            memory.allocate(MemoryType::empty()),
            families,
            ImageLayout::Undefined,
            "owner",
        )
        .unwrap();

    let external = owner.api_description().unwrap();
    assert_eq!(external.current_layout, ImageLayout::ColorAttachmentOptimal);
    assert_eq!(external.default_layout, ImageLayout::ColorAttachmentOptimal);
    assert_eq!(external.queue_family_indices.as_slice(), &[1, 3]);

    let alias = Image::new();
    alias.create_external(&device, &external, "alias", None).unwrap();
    let mut expected = owner.desc();
    expected.is_external = true;
    assert_eq!(alias.desc(), expected);
    assert_eq!(alias.default_layout(), owner.default_layout());
    assert_eq!(alias.queue_families(), families);

    alias.destroy(&device);
    assert_eq!(native.live_images(), 1);
    owner.destroy(&device);
    assert_eq!(native.live_images(), 0);
}

#[test]
#[should_panic(expected = "single queue family")]
fn adopting_with_one_queue_family_is_rejected() {
    let (device, native, _memory) = setup();
    let mut external = swapchain_image(&native);
    external.queue_family_indices.push(0);

    let image = Image::new();
    let _ = image.create_external(&device, &external, "bad", None);
}

#[test]
#[should_panic(expected = "'present' lists queue family 0xfffffffe")]
fn adopting_with_out_of_range_queue_family_names_the_image() {
    let (device, native, _memory) = setup();
    let mut external = swapchain_image(&native);
    external.queue_family_indices.extend([0, 0xFFFF_FFFE]);

    let image = Image::new();
    let _ = image.create_external(&device, &external, "present", None);
}

// ============================================================================
// View Cache Tests
// ============================================================================

#[test]
fn equivalent_descriptors_share_one_view() {
    let (device, native, memory) = setup();
    let image = create(&device, &memory, &render_target(), "color");

    let default = image.get_default_view(&device).unwrap();
    let inherited = image.get_view(&device, &ImageViewDesc::default()).unwrap();
    let explicit = image
        .get_view(
            &device,
            &ImageViewDesc::default()
                .with_format(PixelFormat::RGBA8_UNorm)
                .with_swizzle(Swizzle::new(
                    SwizzleComponent::R,
                    SwizzleComponent::G,
                    SwizzleComponent::B,
                    SwizzleComponent::A,
                )),
        )
        .unwrap();

    assert_eq!(default, inherited);
    assert_eq!(default, explicit);
    assert_eq!(native.events().count(is_create_view), 1);

    let (owner, desc) = native.view(default).unwrap();
    assert_eq!(owner, image.handle().unwrap());
    assert_eq!(desc.aspect_mask, ImageAspect::COLOR);
    image.destroy(&device);
}

#[test]
fn distinct_descriptors_get_distinct_views() {
    let (device, native, memory) = setup();
    let desc = render_target().with_levels(3).with_flags(ImageFlags::MUTABLE_FORMAT);
    let image = create(&device, &memory, &desc, "color");

    let a = image.get_default_view(&device).unwrap();
    let b = image.get_view(&device, &ImageViewDesc::default().with_levels(1, 1)).unwrap();
    let c = image.get_view(&device, &ImageViewDesc::default().with_format(PixelFormat::sRGB8_A8)).unwrap();

    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_ne!(b, c);
    assert_eq!(native.live_views(), 3);
    image.destroy(&device);
}

#[test]
fn concurrent_requests_create_one_view_per_descriptor() {
    let (device, native, memory) = setup();
    let image = create(&device, &memory, &render_target().with_levels(2), "contended");
    native.set_view_delay(Some(Duration::from_millis(5)));

    const THREADS: usize = 8;
    let barrier = Barrier::new(THREADS);
    let returned = AtomicUsize::new(0);
    let mip = ImageViewDesc::default().with_levels(1, 1);

    let handles: Vec<(ImageViewHandle, ImageViewHandle)> = thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    let full = image.get_default_view(&device).unwrap();
                    let level = image.get_view(&device, &mip).unwrap();
                    returned.fetch_add(1, Ordering::Relaxed);
                    (full, level)
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(returned.load(Ordering::Relaxed), THREADS);
    assert!(handles.iter().all(|h| *h == handles[0]));
    assert_eq!(native.events().count(is_create_view), 2);
    assert_eq!(image.view_count(), 2);

    native.set_view_delay(None);
    image.destroy(&device);
}

// ============================================================================
// Frame Scenario
// ============================================================================

#[test]
fn render_target_scenario() {
    let (device, native, memory) = setup();

    // 256x256 color target, one mip, one layer
    let image = create(&device, &memory, &render_target(), "scene_color");
    assert_eq!(image.desc().max_level, 1);
    assert_eq!(image.desc().array_layers, 1);
    assert_eq!(image.default_layout(), ImageLayout::ColorAttachmentOptimal);

    // two concurrent default-view requests
    native.set_view_delay(Some(Duration::from_millis(10)));
    let barrier = Barrier::new(2);
    let (a, b) = thread::scope(|scope| {
        let request = || {
            barrier.wait();
            image.get_default_view(&device).unwrap()
        };
        let a = scope.spawn(request);
        let b = scope.spawn(request);
        (a.join().unwrap(), b.join().unwrap())
    });
    native.set_view_delay(None);
    assert_eq!(a, b);
    assert_eq!(native.events().count(is_create_view), 1);

    // bind the target to a sampled-image uniform
    let layout = UniformLayout::builder().image("scene_color", 0).build();
    let mut table = BindingTable::new(RawDescriptorSetLayoutId::new(0, 0), layout);
    let uniform = UniformId::new("scene_color");
    let image_id = RawImageId::new(0, 1);
    let view = ImageViewDesc::from_image(&image.desc());

    table.bind_image_view(uniform, image_id, view);
    assert_eq!(table.cached_handle(), None);

    let sentinel = RawPipelineResourcesId::new(99, 1);
    table.set_cached_handle(sentinel);
    table.bind_image_view(uniform, image_id, view);
    assert_eq!(table.cached_handle(), Some(sentinel));

    let swizzled = view.with_swizzle(Swizzle::new(
        SwizzleComponent::R,
        SwizzleComponent::R,
        SwizzleComponent::R,
        SwizzleComponent::One,
    ));
    table.bind_image_view(uniform, image_id, swizzled);
    assert_eq!(table.cached_handle(), None);

    image.destroy(&device);
    assert_eq!(native.live_images(), 0);
    assert_eq!(native.live_views(), 0);
}
