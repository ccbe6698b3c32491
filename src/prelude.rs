//! # objlayout Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the objlayout library. Import this module to get quick access to the essential
//! types for defining types and resolving their extension data.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all objlayout operations
pub use crate::Error;

/// The result type used throughout objlayout
pub use crate::Result;

/// Configuration for layout construction
pub use crate::LayoutConfig;

// ================================================================================================
// Type System
// ================================================================================================

/// Registry driving type finalization, and the description of a new type
pub use crate::typesystem::{TypeRegistry, TypeSpec};

/// Registered types and their handles
pub use crate::typesystem::{ManagedType, ManagedTypeRc, TypeHandle};

/// Regions preceding an instance, and the pointer width sizing them
pub use crate::typesystem::{PointerSize, RegionFlags};

// ================================================================================================
// Extension Data
// ================================================================================================

/// Retrieval of extension blocks
pub use crate::layout::{get_extension_data, get_extension_size};

/// Built layouts
pub use crate::layout::{Layout, LayoutRc, LayoutStrategy};

/// Instances carrying extension memory
pub use crate::object::{ManagedObject, ObjectBlock};

// ================================================================================================
// Garbage Collection
// ================================================================================================

/// Reference manager protocol
pub use crate::gc::{GcInfo, GcPhase, ReferenceManager, ReferenceManagers};
