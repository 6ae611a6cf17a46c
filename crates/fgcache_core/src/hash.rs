//! Content hashing
//!
//! [`HashVal`] wraps a 64-bit content hash computed with `FxHasher`, which is
//! unseeded: equal values always produce equal hashes, across threads and
//! across runs.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// A deterministic 64-bit content hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HashVal(u64);

impl HashVal {
    #[inline]
    #[must_use]
    pub fn of<T: Hash + ?Sized>(value: &T) -> Self {
        let mut hasher = FxHasher::default();
        value.hash(&mut hasher);
        Self(hasher.finish())
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Order-dependent combination of two hashes.
    #[inline]
    #[must_use]
    pub fn combine(self, other: HashVal) -> Self {
        let mut hasher = FxHasher::default();
        hasher.write_u64(self.0);
        hasher.write_u64(other.0);
        Self(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_hash_equal() {
        assert_eq!(HashVal::of(&(1u64, 2u32)), HashVal::of(&(1u64, 2u32)));
    }

    #[test]
    fn combine_is_order_dependent() {
        let a = HashVal::of(&1u32);
        let b = HashVal::of(&2u32);
        assert_ne!(a.combine(b), b.combine(a));
    }
}
