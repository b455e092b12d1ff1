//! # Types
//!
//! Identifiers, addresses, handles, and the process/thread/module snapshot
//! that debug events read and maintain.

pub mod address;
pub mod handle;
pub mod process;

// Re-export all public types
pub use address::Address;
pub use handle::{valid_handle, FileHandle, ProcessHandle, RawHandle, ThreadHandle, INVALID_HANDLE_VALUE};
pub use process::{file_name_from_path, Module, Process, ProcessId, System, Thread, ThreadId};
