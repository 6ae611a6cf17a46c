//! Resource Settings
//!
//! Runtime switches of the lifecycle manager and the view cache.
//!
//! ```rust,ignore
//! use fgcache_vulkan::{ResourceSettings, ValidationMode};
//!
//! // Keep going on unsupported requests, but say so in the log
//! let settings = ResourceSettings {
//!     validation: ValidationMode::Warn,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

/// How capability rejections are handled at create and view time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// A rejected request fails with an `Unsupported*` error.
    #[default]
    Strict,
    /// A rejected request is logged and forwarded to the driver anyway.
    Warn,
    /// Capability checks are skipped.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSettings {
    pub validation: ValidationMode,
    /// Forward debug names to the native device.
    pub debug_names: bool,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            validation: ValidationMode::Strict,
            debug_names: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: ResourceSettings = serde_json::from_str(r#"{ "validation": "warn" }"#).unwrap();
        assert_eq!(settings.validation, ValidationMode::Warn);
        assert!(settings.debug_names);
    }
}
