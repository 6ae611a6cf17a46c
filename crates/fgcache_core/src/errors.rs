//! Error Types
//!
//! The main error type [`FgError`] covers the recoverable failure modes of the
//! caching layer:
//! - native API calls that returned a non-success status
//! - memory binding failures reported by the allocation service
//! - capability rejections escalated by a create/view request
//! - malformed device-capability profiles
//!
//! Caller-contract violations (binding the wrong resource kind, creating an
//! object twice, ...) are not represented here: they panic.
//!
//! ```rust,ignore
//! use fgcache_core::errors::{FgError, Result};
//!
//! fn create() -> Result<()> {
//!     Err(FgError::NotCreated)
//! }
//! ```

use thiserror::Error;

/// The main error type for fgcache.
#[derive(Error, Debug)]
pub enum FgError {
    // ========================================================================
    // Native API Errors
    // ========================================================================
    /// A native call returned a non-success status code.
    #[error("Native call `{call}` failed with status {code}")]
    NativeCall {
        /// Name of the failing entry point
        call: &'static str,
        /// Raw status code returned by the driver
        code: i32,
    },

    /// The memory service could not bind backing memory to an object.
    #[error("Memory bind failed: {0}")]
    MemoryBind(String),

    // ========================================================================
    // Capability Errors
    // ========================================================================
    /// The image descriptor is not supported by the device.
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    /// The view descriptor is not compatible with the image or device.
    #[error("Unsupported image view: {0}")]
    UnsupportedView(String),

    // ========================================================================
    // State Errors
    // ========================================================================
    /// The object has no live native handle.
    #[error("Object has not been created")]
    NotCreated,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A device-capability profile could not be parsed.
    #[error("Device profile error: {0}")]
    DeviceProfile(#[from] serde_json::Error),
}

/// Alias for `Result<T, FgError>`.
pub type Result<T> = std::result::Result<T, FgError>;
