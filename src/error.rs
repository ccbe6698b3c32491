use thiserror::Error;

use crate::{gc::GcPhase, typesystem::TypeHandle};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Absence of extension data is never an error: lookups return `None`. Errors come out of
/// type finalization, instance allocation and the GC reference-manager protocol.
///
/// # Error Categories
///
/// ## Type Registry Errors
/// - [`Error::TypeNotFound`] - A base type handle is not registered
///
/// ## Layout Construction Errors
/// - [`Error::LayoutAllocation`] - The entry table could not be reserved
/// - [`Error::LayoutOverflow`] - Offsets no longer fit the signed 32-bit range
/// - [`Error::ExtensionSizeLimit`] - The requested extension block is too large
/// - [`Error::Malformed`] - A built layout violates its own invariants
///
/// ## Object Errors
/// - [`Error::ObjectAllocation`] - Instance storage could not be reserved
///
/// ## Reference Manager Errors
/// - [`Error::ReferenceManager`] - A manager callback reported a failure
/// - [`Error::LockError`] - Thread synchronization failure
///
/// # Examples
///
/// ```rust
/// use objlayout::{Error, TypeRegistry, TypeSpec};
///
/// let registry = TypeRegistry::new();
/// match registry.create_type(TypeSpec::new("Huge").extension_size(usize::MAX / 2)) {
///     Ok(_) => println!("registered"),
///     Err(Error::ExtensionSizeLimit { requested, limit }) => {
///         eprintln!("{requested} exceeds {limit}");
///     }
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to find type in the `TypeRegistry`.
    ///
    /// Raised when a type lists a base handle that was never registered.
    #[error("Failed to find type in TypeRegistry - {0}")]
    TypeNotFound(TypeHandle),

    /// The entry table of a layout could not be allocated.
    ///
    /// Finalization of the type is aborted; no partially built layout is ever bound.
    #[error("Failed to allocate layout entry table with {entries} entries")]
    LayoutAllocation {
        /// Number of entries that were requested
        entries: usize,
    },

    /// The accumulated extension memory no longer fits into the offset range.
    #[error("Layout size {size} exceeds the addressable offset range")]
    LayoutOverflow {
        /// The size that could not be represented
        size: usize,
    },

    /// The requested extension size is above the configured limit.
    #[error("Requested extension size {requested} exceeds the limit of {limit} bytes")]
    ExtensionSizeLimit {
        /// The requested extension size in bytes
        requested: usize,
        /// The configured maximum
        limit: usize,
    },

    /// A built layout is inconsistent.
    ///
    /// Produced by the layout validator. The error includes the source location where the
    /// inconsistency was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Backing storage for an object instance could not be allocated.
    #[error("Failed to allocate object storage of {size} bytes")]
    ObjectAllocation {
        /// The instance size that was requested
        size: usize,
    },

    /// A reference manager failed during a collection phase.
    #[error("Reference manager failed during {phase} - {message}")]
    ReferenceManager {
        /// The phase that was being dispatched
        phase: GcPhase,
        /// The message reported by the manager
        message: String,
    },

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically
    /// when trying to acquire a mutex or rwlock that is in an invalid state.
    #[error("Failed to lock target")]
    LockError,
}
