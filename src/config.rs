//! Layout construction configuration
//!
//! This module provides the options that influence how layouts are built when a type is
//! finalized. Lookups are not configurable; they only ever read what construction produced.

use crate::typesystem::PointerSize;

/// Largest extension block a single type may request (256 MiB)
pub const MAX_EXTENSION_SIZE: usize = 0x1000_0000;

/// Configuration for layout construction during type finalization
///
/// The configuration is consulted once per type by the
/// [`crate::layout::LayoutBuilder`]. It controls how the opaque preceding regions are
/// sized, how requested extension sizes are aligned, and whether every built layout is
/// checked against its invariants before it is bound to the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Pointer width of the target, used to size the regions that precede the object
    pub pointer_size: PointerSize,

    /// Requested extension sizes are rounded up to a multiple of this value (must be a power of 2)
    pub alignment: usize,

    /// Maximum extension size a single type may request
    pub max_extension_size: usize,

    /// Verify offsets and table placement after every build (cheap, one pass per layout)
    pub validate_layouts: bool,

    /// Seed for the layout id generator; `None` draws a random seed
    pub id_seed: Option<u64>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let pointer_size = PointerSize::native();
        Self {
            pointer_size,
            alignment: pointer_size.bytes(),
            max_extension_size: MAX_EXTENSION_SIZE,
            validate_layouts: true,
            id_seed: None,
        }
    }
}

impl LayoutConfig {
    /// Creates a minimal configuration for maximum performance
    ///
    /// Skips post-build validation.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            validate_layouts: false,
            ..Self::default()
        }
    }

    /// Creates a configuration with all checks enabled
    #[must_use]
    pub fn strict() -> Self {
        Self {
            validate_layouts: true,
            ..Self::default()
        }
    }

    /// Creates a validating configuration whose layout ids are reproducible
    ///
    /// ## Arguments
    /// * `seed` - Seed for the layout id generator
    #[must_use]
    pub fn deterministic(seed: u64) -> Self {
        Self {
            id_seed: Some(seed),
            ..Self::strict()
        }
    }

    /// Override the target pointer width, keeping the alignment in step with it
    ///
    /// ## Arguments
    /// * `pointer_size` - The pointer width to size preceding regions with
    #[must_use]
    pub fn with_pointer_size(mut self, pointer_size: PointerSize) -> Self {
        self.pointer_size = pointer_size;
        self.alignment = pointer_size.bytes();
        self
    }

    /// Round a requested extension size up to the configured alignment
    ///
    /// Returns `None` if rounding would overflow.
    #[must_use]
    pub fn align(&self, size: usize) -> Option<usize> {
        let align = self.alignment.max(1);
        size.checked_next_multiple_of(align)
    }
}
