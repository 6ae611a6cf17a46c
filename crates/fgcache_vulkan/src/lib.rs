//! Capability validation, image lifecycle and view caching.
//!
//! The [`Device`] bundles a [`NativeDevice`], a [`MemoryService`], a
//! [`DeviceCaps`] snapshot and the [`ResourceSettings`]. [`Image`] creates,
//! adopts and destroys native images against it and caches their views.

pub mod backend;
pub mod caps;
pub mod device;
pub mod image;
pub mod memory;
pub mod settings;
pub mod validator;

pub use caps::{DeviceCaps, DeviceFeatures, FormatCaps, FormatFeatures, ImageFormatLimits, TilingCaps};
pub use device::{Device, ImageCreateInfo, NativeDevice, SharingMode};
pub use image::{ExternalImageDesc, Image, OnRelease};
pub use memory::MemoryService;
pub use settings::{ResourceSettings, ValidationMode};
pub use validator::{is_image_supported, is_view_supported};
