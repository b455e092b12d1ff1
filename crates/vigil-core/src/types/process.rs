//! Process, thread, and module snapshot types.
//!
//! The snapshot is what the debugger believes about its targets. Debug events
//! keep it current: process/thread/module creation events register entries
//! before the user's handler runs, and exit/unload events remove them after.
//!
//! Events can race ahead of snapshot maintenance (or a notification can be
//! missed entirely), so every lookup the event layer performs is a
//! get-or-create. A placeholder entry is a normal outcome, not an error.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use super::Address;

/// Process identifier (PID)
///
/// Wrapping the raw `u32` keeps PIDs from being confused with TIDs, which share
/// the same numeric space on Windows.
///
/// ```rust
/// use vigil_core::types::ProcessId;
///
/// let pid = ProcessId::from(4242);
/// assert_eq!(u32::from(pid), 4242);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier (TID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId
{
    /// Get the raw `u32` representation of the thread identifier
    pub fn raw(self) -> u32
    {
        self.0
    }
}

impl From<u32> for ThreadId
{
    fn from(value: u32) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Strip the directory part of a Windows or POSIX path.
///
/// ```rust
/// use vigil_core::types::file_name_from_path;
///
/// assert_eq!(file_name_from_path(r"C:\Windows\System32\KERNEL32.DLL"), "KERNEL32.DLL");
/// assert_eq!(file_name_from_path("ntdll.dll"), "ntdll.dll");
/// ```
#[must_use]
pub fn file_name_from_path(path: &str) -> &str
{
    path.rsplit(|c| c == '\\' || c == '/').next().unwrap_or(path)
}

/// A thread known to the debugger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread
{
    /// Thread identifier.
    pub tid: ThreadId,
    /// Name set through the MSVC thread-naming exception, if any.
    pub name: Option<String>,
    /// Thread environment block pointer, when reported by a creation event.
    pub teb: Option<Address>,
    /// First instruction the thread runs; absent for threads that existed before attach.
    pub start_address: Option<Address>,
}

impl Thread
{
    /// Create a thread entry with nothing but its identifier.
    #[must_use]
    pub fn new(tid: ThreadId) -> Self
    {
        Self {
            tid,
            name: None,
            teb: None,
            start_address: None,
        }
    }
}

/// A module (executable image or DLL) mapped into a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module
{
    /// Load address of the image.
    pub base: Address,
    /// Full path of the image file, when it could be determined.
    pub filename: Option<String>,
}

impl Module
{
    /// Create a module entry.
    #[must_use]
    pub fn new(base: Address, filename: Option<String>) -> Self
    {
        Self { base, filename }
    }

    /// File name without its directory, e.g. `kernel32.dll`.
    #[must_use]
    pub fn name(&self) -> Option<&str>
    {
        self.filename.as_deref().map(file_name_from_path)
    }
}

/// A process known to the debugger, with its threads and modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process
{
    /// Process identifier.
    pub pid: ProcessId,
    /// Path of the main executable, when known.
    pub image_name: Option<String>,
    threads: BTreeMap<ThreadId, Thread>,
    modules: BTreeMap<Address, Module>,
}

impl Process
{
    /// Create an empty process entry.
    #[must_use]
    pub fn new(pid: ProcessId) -> Self
    {
        Self {
            pid,
            image_name: None,
            threads: BTreeMap::new(),
            modules: BTreeMap::new(),
        }
    }

    /// Returns `true` if the thread is in the snapshot.
    #[must_use]
    pub fn has_thread(&self, tid: ThreadId) -> bool
    {
        self.threads.contains_key(&tid)
    }

    /// Look up a thread.
    #[must_use]
    pub fn thread(&self, tid: ThreadId) -> Option<&Thread>
    {
        self.threads.get(&tid)
    }

    /// Look up a thread mutably.
    pub fn thread_mut(&mut self, tid: ThreadId) -> Option<&mut Thread>
    {
        self.threads.get_mut(&tid)
    }

    /// Resolve a thread, registering a placeholder when it is missing.
    pub fn get_or_create_thread(&mut self, tid: ThreadId) -> &mut Thread
    {
        let pid = self.pid;
        self.threads.entry(tid).or_insert_with(|| {
            debug!(pid = pid.0, tid = tid.0, "registering placeholder thread");
            Thread::new(tid)
        })
    }

    /// Insert or replace a thread.
    pub fn add_thread(&mut self, thread: Thread)
    {
        self.threads.insert(thread.tid, thread);
    }

    /// Remove a thread, returning it if it was present.
    pub fn remove_thread(&mut self, tid: ThreadId) -> Option<Thread>
    {
        self.threads.remove(&tid)
    }

    /// Iterate over the known threads in TID order.
    pub fn threads(&self) -> impl Iterator<Item = &Thread>
    {
        self.threads.values()
    }

    /// Look up the module loaded at `base`.
    #[must_use]
    pub fn module(&self, base: Address) -> Option<&Module>
    {
        self.modules.get(&base)
    }

    /// Insert or replace a module.
    pub fn add_module(&mut self, module: Module)
    {
        self.modules.insert(module.base, module);
    }

    /// Remove the module loaded at `base`.
    pub fn remove_module(&mut self, base: Address) -> Option<Module>
    {
        self.modules.remove(&base)
    }

    /// Iterate over the known modules in base-address order.
    pub fn modules(&self) -> impl Iterator<Item = &Module>
    {
        self.modules.values()
    }
}

/// Snapshot of every process the debug session knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct System
{
    processes: BTreeMap<ProcessId, Process>,
}

impl System
{
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Returns `true` if the process is in the snapshot.
    #[must_use]
    pub fn has_process(&self, pid: ProcessId) -> bool
    {
        self.processes.contains_key(&pid)
    }

    /// Look up a process.
    #[must_use]
    pub fn process(&self, pid: ProcessId) -> Option<&Process>
    {
        self.processes.get(&pid)
    }

    /// Look up a process mutably.
    pub fn process_mut(&mut self, pid: ProcessId) -> Option<&mut Process>
    {
        self.processes.get_mut(&pid)
    }

    /// Resolve a process, registering a placeholder when it is missing.
    pub fn get_or_create_process(&mut self, pid: ProcessId) -> &mut Process
    {
        self.processes.entry(pid).or_insert_with(|| {
            debug!(pid = pid.0, "registering placeholder process");
            Process::new(pid)
        })
    }

    /// Insert or replace a process.
    pub fn add_process(&mut self, process: Process)
    {
        self.processes.insert(process.pid, process);
    }

    /// Remove a process and everything it owns.
    pub fn remove_process(&mut self, pid: ProcessId) -> Option<Process>
    {
        self.processes.remove(&pid)
    }

    /// Number of processes in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.processes.len()
    }

    /// Returns `true` if no process is known.
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.processes.is_empty()
    }

    /// Iterate over the known processes in PID order.
    pub fn processes(&self) -> impl Iterator<Item = &Process>
    {
        self.processes.values()
    }
}
