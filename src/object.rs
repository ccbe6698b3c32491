//! Object instances carrying extension memory.
//!
//! The layout resolver never allocates objects itself; it only needs two things from an
//! instance: its runtime type and its base address. [`ManagedObject`] is that seam.
//! [`ObjectBlock`] is a heap-backed implementation that reserves the full instance prefix
//! (extension memory and preceding regions) in front of the object body, zero-initialized.
//!
//! # Memory Picture
//!
//! ```text
//! [ extension blocks ... ][ preceding regions ][ object body ... ]
//!                                              ^ base address
//! ```

use std::{ops::Range, ptr::NonNull};

use crate::{
    layout::get_extension_data,
    typesystem::{ManagedType, ManagedTypeRc},
    Error, Result,
};

/// An instance whose extension data can be resolved.
pub trait ManagedObject {
    /// The runtime type of the instance
    fn managed_type(&self) -> &ManagedType;

    /// Address of the object body; extension blocks live at negative offsets from it
    ///
    /// The address is obtained through a shared borrow, so pointers derived from it may only
    /// be read. Implementations that allow writes expose them through `&mut self`, as
    /// [`ObjectBlock::extension_mut`] does.
    fn base_address(&self) -> NonNull<u8>;
}

/// A zeroed, heap-backed instance of a [`ManagedType`].
///
/// Storage is word aligned, so every block offset that is a multiple of the configured
/// alignment yields an aligned address.
pub struct ObjectBlock {
    ty: ManagedTypeRc,
    storage: Vec<u64>,
    prefix: usize,
}

impl ObjectBlock {
    /// Allocate a new instance of `ty`
    ///
    /// # Errors
    /// - [`Error::LayoutOverflow`] if the instance size cannot be represented
    /// - [`Error::ObjectAllocation`] if the storage cannot be reserved
    pub fn allocate(ty: &ManagedTypeRc) -> Result<Self> {
        let prefix = ty.instance_prefix().ok_or(Error::LayoutOverflow {
            size: ty.preceding_size,
        })?;
        let size = ty.instance_size().ok_or(Error::LayoutOverflow {
            size: ty.basic_size,
        })?;
        let words = size
            .checked_add(7)
            .map(|padded| padded / 8)
            .ok_or(Error::LayoutOverflow { size })?;

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(words)
            .map_err(|_| Error::ObjectAllocation { size })?;
        storage.resize(words, 0);

        Ok(ObjectBlock {
            ty: ty.clone(),
            storage,
            prefix,
        })
    }

    /// The shared type of this instance
    pub fn ty(&self) -> &ManagedTypeRc {
        &self.ty
    }

    /// Bytes reserved in front of the base address
    pub fn prefix(&self) -> usize {
        self.prefix
    }

    /// The object body, starting at the base address
    pub fn body(&self) -> &[u8] {
        &self.bytes()[self.prefix..]
    }

    /// Mutable access to the object body
    pub fn body_mut(&mut self) -> &mut [u8] {
        let prefix = self.prefix;
        &mut self.bytes_mut()[prefix..]
    }

    /// The extension block `ty` declared, if this instance carries one
    pub fn extension(&self, ty: &ManagedType) -> Option<&[u8]> {
        let range = self.block_range(ty)?;
        self.bytes().get(range)
    }

    /// Mutable access to the extension block `ty` declared
    pub fn extension_mut(&mut self, ty: &ManagedType) -> Option<&mut [u8]> {
        let range = self.block_range(ty)?;
        self.bytes_mut().get_mut(range)
    }

    fn block_range(&self, ty: &ManagedType) -> Option<Range<usize>> {
        let address = get_extension_data(self, ty)?;
        let start = (address.as_ptr() as usize).checked_sub(self.bytes().as_ptr() as usize)?;
        Some(start..start + ty.extension_size())
    }

    fn bytes(&self) -> &[u8] {
        // SAFETY: u64 has no padding or invalid bit patterns and u8 has alignment 1, so the
        // words may be viewed as bytes; the length covers exactly the initialized words.
        unsafe {
            std::slice::from_raw_parts(self.storage.as_ptr().cast::<u8>(), self.storage.len() * 8)
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: see `bytes`; the exclusive borrow of `self` covers the returned slice.
        unsafe {
            std::slice::from_raw_parts_mut(
                self.storage.as_mut_ptr().cast::<u8>(),
                self.storage.len() * 8,
            )
        }
    }
}

impl ManagedObject for ObjectBlock {
    fn managed_type(&self) -> &ManagedType {
        &self.ty
    }

    fn base_address(&self) -> NonNull<u8> {
        let bytes = self.bytes();
        let start = NonNull::from(bytes).cast::<u8>();
        // SAFETY: `prefix <= bytes.len()` holds from allocation on, and the pointer keeps the
        // provenance of the whole storage, so blocks in front of the body stay reachable.
        unsafe { start.add(self.prefix.min(bytes.len())) }
    }
}

impl std::fmt::Debug for ObjectBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBlock")
            .field("ty", &self.ty.handle)
            .field("prefix", &self.prefix)
            .field("size", &(self.storage.len() * 8))
            .finish()
    }
}
