//! Native device implementations.

pub mod headless;
#[cfg(feature = "vulkan")]
pub mod vulkan;

pub use headless::{EventLog, HeadlessDevice, HeadlessEvent, HeadlessImage, HeadlessMemory, headless_device};
#[cfg(feature = "vulkan")]
pub use vulkan::AshDevice;
