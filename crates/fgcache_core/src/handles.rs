//! Opaque native handles
//!
//! Native objects are addressed by non-dispatchable 64-bit handles. Zero is
//! the null handle, so a handle that exists is never null and the "not
//! created" state is spelled `Option<Handle>`.

use std::fmt;
use std::num::NonZeroU64;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Wraps a raw native handle, returning `None` for the null handle.
            #[inline]
            #[must_use]
            pub const fn from_raw(raw: u64) -> Option<Self> {
                match NonZeroU64::new(raw) {
                    Some(v) => Some(Self(v)),
                    None => None,
                }
            }

            #[inline]
            #[must_use]
            pub const fn as_raw(self) -> u64 {
                self.0.get()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0.get())
            }
        }
    };
}

native_handle!(
    /// Native image handle (`VkImage`).
    ImageHandle
);
native_handle!(
    /// Native image view handle (`VkImageView`).
    ImageViewHandle
);

/// Kind of native object, used when naming objects for debuggers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Image,
    ImageView,
}
