//! Flags describing the opaque regions that precede an object's base address.
//!
//! Extension blocks are placed in front of the object, so everything else that already
//! lives in front of it has to be skipped first. Each region is a fixed, independently
//! flagged contribution whose size depends only on the target pointer width.
//!
//! # Key Types
//! - [`RegionFlags`]: Which preceding regions a type carries
//! - [`PointerSize`]: Target pointer width used to size those regions

use bitflags::bitflags;

/// Target pointer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerSize {
    /// 4-byte pointers
    Bit32,
    /// 8-byte pointers
    #[default]
    Bit64,
}

impl PointerSize {
    /// Pointer width of the host this crate was compiled for
    #[must_use]
    pub fn native() -> Self {
        if std::mem::size_of::<usize>() == 4 {
            PointerSize::Bit32
        } else {
            PointerSize::Bit64
        }
    }

    /// Size of a single pointer in bytes
    #[must_use]
    pub fn bytes(self) -> usize {
        match self {
            PointerSize::Bit32 => 4,
            PointerSize::Bit64 => 8,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Opaque regions stored immediately before an object's base address
    pub struct RegionFlags: u32 {
        /// A managed dictionary pointer (one pointer)
        const MANAGED_DICT = 0x0001;
        /// A garbage collector header (two pointers)
        const HAVE_GC = 0x0002;
        /// A managed weak reference list pointer (one pointer)
        const MANAGED_WEAKREF = 0x0004;
    }
}

impl RegionFlags {
    /// Total number of bytes occupied by the flagged regions in front of the object.
    ///
    /// ## Arguments
    /// * `ptr_size` - The pointer width of the target
    #[must_use]
    pub fn preceding_size(self, ptr_size: PointerSize) -> usize {
        let ptr = ptr_size.bytes();
        let mut base = 0;
        if self.contains(RegionFlags::MANAGED_DICT) {
            base += ptr;
        }
        if self.contains(RegionFlags::HAVE_GC) {
            base += ptr * 2;
        }
        if self.contains(RegionFlags::MANAGED_WEAKREF) {
            base += ptr;
        }
        base
    }
}
