//! # Target Collaborators
//!
//! The engine never talks to the OS directly. Everything it needs from the
//! debugged system goes through the traits in this module:
//!
//! - [`MemoryAccess`]: read bytes, pointers and strings from a process
//! - [`HandleAccess`]: name and close file handles delivered in events
//! - [`ThreadContext`]: segment registers and descriptor-table entries
//! - [`HookInstaller`]: patch an exported function for an API hook and
//!   recognize its traps
//! - [`BreakpointOracle`]: does the debugger own a given trap?
//!
//! [`Target`] is the union of all five and is what a [`DebugSession`](crate::session::DebugSession)
//! session holds. It is implemented automatically for any type that
//! implements the parts.
//!
//! ## Why traits?
//!
//! - A Windows backend implements them on top of `ReadProcessMemory`,
//!   `GetFinalPathNameByHandleW`, `GetThreadSelectorEntry` and friends
//! - Recorded sessions can be replayed without a live target
//! - Tests drive the whole dispatch cycle with an in-memory mock

use crate::error::{VigilError, VigilResult};
use crate::hooks::{ApiHookHit, ApiHookSpec};
use crate::segment::{LdtEntry, SegmentRegister};
use crate::types::{Address, FileHandle, ProcessId, ThreadId};

/// Decode a string read from target memory.
///
/// The result stops at the first NUL. UTF-16 data is little-endian; an odd
/// trailing byte is ignored.
#[must_use]
pub fn bytes_to_string(unicode: bool, bytes: &[u8]) -> String
{
    if unicode {
        let mut units: Vec<u16> = bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
        if let Some(index) = units.iter().position(|c| *c == 0) {
            units.truncate(index);
        }
        String::from_utf16_lossy(&units)
    } else {
        let end = bytes.iter().position(|c| *c == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }
}

/// Reads from a target process's address space.
pub trait MemoryAccess
{
    /// Read up to `size` bytes at `address`.
    ///
    /// A short result means the range crossed into unreadable memory. An error
    /// means nothing could be read at all.
    fn read_memory(&self, pid: ProcessId, address: Address, size: usize) -> VigilResult<Vec<u8>>;

    /// Pointer width of the target process in bytes (4 or 8).
    fn pointer_size(&self, _pid: ProcessId) -> usize
    {
        8
    }

    /// Read one pointer-sized little-endian value.
    fn read_pointer(&self, pid: ProcessId, address: Address) -> VigilResult<Address>
    {
        let size = self.pointer_size(pid);
        let bytes = self.read_memory(pid, address, size)?;
        if bytes.len() < size {
            return Err(VigilError::MemoryRead {
                address,
                size,
                details: format!("short read of {} bytes", bytes.len()),
            });
        }

        let mut raw = [0u8; 8];
        let width = size.min(raw.len());
        raw[..width].copy_from_slice(&bytes[..width]);
        Ok(Address::from(u64::from_le_bytes(raw)))
    }

    /// Read a NUL-terminated string of at most `max_chars` characters.
    fn read_string(&self, pid: ProcessId, address: Address, unicode: bool, max_chars: usize) -> VigilResult<String>
    {
        let width = if unicode { 2 } else { 1 };
        let bytes = self.read_memory(pid, address, max_chars.saturating_mul(width))?;
        Ok(bytes_to_string(unicode, &bytes))
    }
}

/// Queries and releases OS handles delivered in debug events.
pub trait HandleAccess
{
    /// Path of the file behind `handle`, if the OS can tell.
    fn file_name(&self, handle: FileHandle) -> Option<String>;

    /// Close a file handle the debugger owns.
    fn close_handle(&mut self, handle: FileHandle) -> VigilResult<()>;

    /// Image path of a process, queried from the process itself.
    fn process_image_name(&self, _pid: ProcessId) -> Option<String>
    {
        None
    }
}

/// Per-thread segmentation state.
///
/// The caller suspends the thread before querying it.
pub trait ThreadContext
{
    /// Current value of a segment register.
    fn segment_register(&self, tid: ThreadId, register: SegmentRegister) -> VigilResult<u16>;

    /// Descriptor for `selector` in the thread's GDT/LDT.
    fn selector_entry(&self, tid: ThreadId, selector: u16) -> VigilResult<LdtEntry>;
}

/// Installs inline API hooks.
pub trait HookInstaller
{
    /// Hook `spec.symbol` in the copy of `module` loaded by `pid`.
    fn install_api_hook(&mut self, pid: ProcessId, module: &str, spec: &ApiHookSpec) -> VigilResult<()>;

    /// The hooked call behind a trap at `address`, if the trap is one of ours.
    ///
    /// Entry hits carry the return address and the declared number of stack
    /// arguments; exit hits carry the return value.
    fn api_hook_hit(&self, _pid: ProcessId, _tid: ThreadId, _address: Address) -> VigilResult<Option<ApiHookHit>>
    {
        Ok(None)
    }
}

/// Kind of trap a breakpoint-like exception reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapKind
{
    /// `EXCEPTION_BREAKPOINT` (software breakpoint)
    Breakpoint,
    /// `EXCEPTION_SINGLE_STEP` (trap flag or hardware breakpoint)
    SingleStep,
    /// `EXCEPTION_GUARD_PAGE` (page breakpoint)
    GuardPage,
}

/// Knows which traps the debugger itself planted.
pub trait BreakpointOracle
{
    /// `true` if the trap at `address` belongs to the debugger rather than the target.
    fn owns_trap(&self, _pid: ProcessId, _tid: ThreadId, _kind: TrapKind, _address: Address) -> VigilResult<bool>
    {
        Ok(false)
    }
}

/// Everything the engine needs from a debugged system.
pub trait Target: MemoryAccess + HandleAccess + ThreadContext + HookInstaller + BreakpointOracle {}

impl<T> Target for T where T: MemoryAccess + HandleAccess + ThreadContext + HookInstaller + BreakpointOracle {}
