// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'object.rs' views the word-aligned instance storage as bytes

//! # objlayout
//!
//! Per-type extension data for managed object runtimes.
//!
//! A type may declare a private, fixed-size block of memory that is attached to every
//! instance of itself and of all its subtypes. Blocks are invisible to other types and are
//! retrieved in constant time, even when a hierarchy uses multiple or diamond inheritance.
//! `objlayout` computes where each block lives and resolves it for any instance.
//!
//! ## Features
//!
//! - **O(1) lookup for single inheritance** - one array access, no probing
//! - **Bounded probing for multiple inheritance** - open addressing with a searched hash shift
//! - **Exact-type retrieval** - a subtype never sees another type's block
//! - **Immutable layouts** - built once at type finalization, shared freely across threads
//! - **Validated construction** - optional post-build invariant checks
//!
//! ## Quick Start
//!
//! ```rust
//! use objlayout::prelude::*;
//!
//! let registry = TypeRegistry::new();
//! let base = registry.create_type(TypeSpec::new("Base").extension_size(16))?;
//! let derived = registry.create_type(
//!     TypeSpec::new("Derived")
//!         .base(base.handle)
//!         .flags(RegionFlags::HAVE_GC)
//!         .basic_size(32)
//!         .extension_size(8),
//! )?;
//!
//! let mut object = ObjectBlock::allocate(&derived)?;
//! object.extension_mut(&base).unwrap().fill(0xAB);
//!
//! assert_eq!(get_extension_size(&base), 16);
//! assert!(get_extension_data(&object, &derived).is_some());
//! # Ok::<(), objlayout::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`typesystem`] - Type handles, the type registry and preceding-region flags
//! - [`layout`] - Offset planning, ordered and hashed lookup, building and validation
//! - [`object`] - The object seam used by lookups and a heap-backed instance
//! - [`gc`] - Reference managers called by a collector at fixed phases
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! Construction is instrumented through the `log` facade. No logger is installed by the
//! library; hook up any `log` compatible backend to see strategy selection and hash
//! searches.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use objlayout::prelude::*;
///
/// let registry = TypeRegistry::new();
/// let ty = registry.create_type(TypeSpec::new("Widget").extension_size(8))?;
/// assert_eq!(get_extension_size(&ty), 8);
/// # Ok::<(), objlayout::Error>(())
/// ```
pub mod prelude;

/// Layout construction settings
pub mod config;
pub mod gc;
pub mod layout;
pub mod object;
pub mod typesystem;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `objlayout` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

pub use config::{LayoutConfig, MAX_EXTENSION_SIZE};

pub use gc::{
    CollectableFn, GcInfo, GcPhase, ManagerId, ReferenceManager, ReferenceManagers, TraverseFn,
    VisitFn,
};

pub use layout::{
    get_extension_data, get_extension_size, Layout, LayoutBuilder, LayoutEntry, LayoutKey,
    LayoutRc, LayoutSource, LayoutStrategy, LayoutValidator, HASH_SHIFT_TRIALS,
};

pub use object::{ManagedObject, ObjectBlock};

pub use typesystem::{
    ManagedType, ManagedTypeRc, PointerSize, RegionFlags, TypeHandle, TypeRegistry, TypeSpec,
};
