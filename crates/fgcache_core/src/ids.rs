//! Resource identifiers
//!
//! Raw ids are 64-bit values made of a 32-bit slot index and a 32-bit
//! generation. `u64::MAX` is reserved as the invalid id, which lets a raw id
//! live inside a single atomic word.

use std::fmt;
use std::hash::{Hash, Hasher};

macro_rules! raw_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Reserved "no object" value.
            pub const INVALID: Self = Self(u64::MAX);

            #[inline]
            #[must_use]
            pub const fn new(index: u32, generation: u32) -> Self {
                Self(((generation as u64) << 32) | index as u64)
            }

            #[inline]
            #[must_use]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            #[must_use]
            pub const fn to_raw(self) -> u64 {
                self.0
            }

            #[inline]
            #[must_use]
            pub const fn index(self) -> u32 {
                self.0 as u32
            }

            #[inline]
            #[must_use]
            pub const fn generation(self) -> u32 {
                (self.0 >> 32) as u32
            }

            #[inline]
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.0 != u64::MAX
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({}:{})", stringify!($name), self.index(), self.generation())
                } else {
                    write!(f, "{}(INVALID)", stringify!($name))
                }
            }
        }
    };
}

raw_id!(
    /// Id of an image owned by the resource manager.
    RawImageId
);
raw_id!(
    /// Id of a buffer owned by the resource manager.
    RawBufferId
);
raw_id!(
    /// Id of a sampler owned by the resource manager.
    RawSamplerId
);
raw_id!(
    /// Id of a memory allocation handed out by the allocation service.
    RawMemoryId
);
raw_id!(
    /// Id of a descriptor set layout.
    RawDescriptorSetLayoutId
);
raw_id!(
    /// Id of a compiled descriptor object for one binding table.
    RawPipelineResourcesId
);

/// Index of a descriptor set inside a pipeline layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DescriptorSetId(pub u32);

/// Name of a uniform slot, stored as the xxh3 hash of the name.
///
/// The hash is deterministic so ids built from the same name in different
/// places compare equal. Names are kept by the layout for diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UniformId(u64);

impl UniformId {
    #[inline]
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(name.as_bytes()))
    }

    #[inline]
    #[must_use]
    pub const fn from_hash(hash: u64) -> Self {
        Self(hash)
    }

    #[inline]
    #[must_use]
    pub const fn hash_value(self) -> u64 {
        self.0
    }
}

impl Hash for UniformId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0);
    }
}

impl From<&str> for UniformId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Debug for UniformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniformId({:#018x})", self.0)
    }
}

impl fmt::Display for UniformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_id_packs_index_and_generation() {
        let id = RawImageId::new(7, 3);
        assert_eq!(id.index(), 7);
        assert_eq!(id.generation(), 3);
        assert!(id.is_valid());
        assert_eq!(RawImageId::from_raw(id.to_raw()), id);
    }

    #[test]
    fn raw_id_default_is_invalid() {
        assert!(!RawPipelineResourcesId::default().is_valid());
        assert_eq!(RawPipelineResourcesId::INVALID.to_raw(), u64::MAX);
    }

    #[test]
    fn uniform_id_is_stable_per_name() {
        assert_eq!(UniformId::new("albedo"), UniformId::from("albedo"));
        assert_ne!(UniformId::new("albedo"), UniformId::new("normal"));
    }
}
