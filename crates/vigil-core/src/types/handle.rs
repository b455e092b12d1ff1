//! OS handle values carried by debug event payloads.
//!
//! The engine never opens or duplicates handles itself. It only wraps the raw
//! values the OS placed in the payload and, for file handles, asks the target
//! collaborator to close them.

use std::fmt;

/// Raw handle value as delivered in a debug event payload.
pub type RawHandle = u64;

/// `INVALID_HANDLE_VALUE` (`(HANDLE)-1`).
pub const INVALID_HANDLE_VALUE: RawHandle = u64::MAX;

/// Returns `None` for the two "no handle" encodings: null and
/// `INVALID_HANDLE_VALUE`.
#[must_use]
pub fn valid_handle(raw: RawHandle) -> Option<RawHandle>
{
    match raw {
        0 | INVALID_HANDLE_VALUE => None,
        raw => Some(raw),
    }
}

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(RawHandle);

        impl $name
        {
            /// Wrap a raw handle, rejecting null and `INVALID_HANDLE_VALUE`.
            #[must_use]
            pub fn from_raw(raw: RawHandle) -> Option<Self>
            {
                valid_handle(raw).map(Self)
            }

            /// The raw handle value.
            #[must_use]
            pub const fn raw(self) -> RawHandle
            {
                self.0
            }
        }

        impl fmt::Display for $name
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
            {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

handle_type! {
    /// Handle to an image file, owned by the debugger once the event is received.
    ///
    /// The OS expects the debugger to close it. Events close it when they are
    /// dropped unless the caller took ownership first.
    FileHandle
}

handle_type! {
    /// Process handle borrowed from the OS; never closed by the engine.
    ProcessHandle
}

handle_type! {
    /// Thread handle borrowed from the OS; never closed by the engine.
    ThreadHandle
}
