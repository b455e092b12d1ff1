//! # Error Types
//!
//! General error handling for the event engine.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Not everything that goes wrong is an error here. A debug event that names a
//! process or thread the snapshot has never seen registers a placeholder, and
//! best-effort lookups such as a module's file name return `None`. Errors are
//! reserved for misuse of an accessor, collaborator failures, and failures
//! raised by user handlers.

use thiserror::Error;

use crate::segment::SegmentError;
use crate::types::Address;

/// Main error type for event engine operations
///
/// ## Error Categories
///
/// 1. **Accessor misuse**: IndexOutOfRange, WrongExceptionKind, InvalidArgument
/// 2. **Collaborator failures**: MemoryRead, HookInstall, Io
/// 3. **Handler failures**: Handler
/// 4. **Segmentation**: Segment
#[derive(Error, Debug)]
pub enum VigilError
{
    /// An exception information slot outside `0..len` was requested.
    #[error("Exception information index {index} out of range (0..{len})")]
    IndexOutOfRange
    {
        /// Requested slot
        index: usize,
        /// Number of slots
        len: usize,
    },

    /// An accessor that only makes sense for one exception code was called
    /// on another, e.g. `access_violation_type` on a breakpoint.
    #[error("Expected {expected}, got {actual}")]
    WrongExceptionKind
    {
        /// Name of the exception the accessor requires
        expected: &'static str,
        /// Name of the exception the event carries
        actual: String,
    },

    /// Target memory could not be read.
    #[error("Failed to read {size} bytes at {address}: {details}")]
    MemoryRead
    {
        /// Start of the requested range
        address: Address,
        /// Number of bytes requested
        size: usize,
        /// Collaborator-provided reason
        details: String,
    },

    /// The hook installer rejected an API hook.
    #[error("Failed to hook {module}!{symbol}: {details}")]
    HookInstall
    {
        /// Lower-cased module name the hook was declared under
        module: String,
        /// Exported symbol name
        symbol: String,
        /// Collaborator-provided reason
        details: String,
    },

    /// A user event handler or bookkeeping routine failed.
    ///
    /// Handlers return `VigilResult`, so they can use this variant to report
    /// their own failures through the dispatcher.
    #[error("Handler failed: {0}")]
    Handler(String),

    /// Invalid argument passed to an engine function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A selector/offset pair could not be resolved to a linear address.
    #[error(transparent)]
    Segment(#[from] SegmentError),

    /// I/O error (for collaborators backed by files, sockets, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, VigilError>`
///
/// ```rust
/// use vigil_core::error::VigilResult;
/// fn foo() -> VigilResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type VigilResult<T> = std::result::Result<T, VigilError>;
