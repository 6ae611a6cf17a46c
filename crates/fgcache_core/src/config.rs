//! Compile-time limits shared by every fgcache crate.

/// Capacity of the dynamic-offset side array of a binding table.
pub const MAX_BUFFER_DYNAMIC_OFFSETS: usize = 8;

/// Maximum number of descriptor sets bound to one pipeline layout.
pub const MAX_DESCRIPTOR_SETS: usize = 8;

/// Number of queue families addressable by a [`QueueFamilyMask`](crate::QueueFamilyMask).
pub const MAX_QUEUE_FAMILIES: u32 = 32;

/// Maximum number of queue family indices passed to a concurrent-sharing image.
pub const MAX_QUEUE_FAMILY_INDICES: usize = 8;

/// Buffer size sentinel: adopt the uniform's declared size.
pub const WHOLE_SIZE: u64 = u64::MAX;

/// View range sentinel: every remaining mip level or array layer.
pub const REMAINING: u32 = u32::MAX;
