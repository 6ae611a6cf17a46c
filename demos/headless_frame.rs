//! Walks one frame's worth of resources through the caching layer on the
//! headless device and prints what reached the native side.
//!
//! Run with `RUST_LOG=debug cargo run --example headless_frame`.

use fgcache::core::RawDescriptorSetLayoutId;
use fgcache::prelude::*;
use fgcache::vulkan::backend::headless_device;

fn main() -> Result<()> {
    env_logger::init();

    let (device, native, memory) = headless_device(DeviceCaps::headless());

    let color = Image::new();
    color.create(
        &device,
        &ImageDesc::d2(1280, 720, PixelFormat::RGBA16F, ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED),
        memory.allocate(MemoryType::empty()),
        QueueFamilyMask::EMPTY,
        ImageLayout::Undefined,
        "hdr_color",
    )?;
    let depth = Image::new();
    depth.create(
        &device,
        &ImageDesc::d2(1280, 720, PixelFormat::Depth32F, ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::SAMPLED),
        memory.allocate(MemoryType::empty()),
        QueueFamilyMask::EMPTY,
        ImageLayout::Undefined,
        "depth",
    )?;

    let layout = UniformLayout::builder()
        .texture("hdr_color", 0)
        .image("depth", 1)
        .uniform_buffer("tonemap", 2, 64, Some(0))
        .build();
    let mut table = BindingTable::new(RawDescriptorSetLayoutId::new(0, 0), layout);
    let cache = DescriptorSetCache::new();
    let mut compiled = 0u32;

    for frame in 0..3u64 {
        // views are created on first use and reused afterwards
        color.get_default_view(&device)?;
        depth.get_default_view(&device)?;

        table
            .bind_texture(UniformId::new("hdr_color"), RawImageId::new(0, 0), RawSamplerId::new(0, 0))
            .bind_image(UniformId::new("depth"), RawImageId::new(1, 0))
            .bind_buffer_range(UniformId::new("tonemap"), RawBufferId::new(0, 0), frame * 256, WHOLE_SIZE);

        let set = cache.get_or_create(&table, |_| {
            compiled += 1;
            Ok(RawPipelineResourcesId::new(compiled, 0))
        })?;
        println!("frame {frame}: descriptor set {set:?}, dynamic offsets {:?}", table.dynamic_offsets());
    }

    println!(
        "{} images, {} views, {} descriptor sets compiled",
        native.live_images(),
        native.live_views(),
        compiled
    );

    color.destroy(&device);
    depth.destroy(&device);
    Ok(())
}
