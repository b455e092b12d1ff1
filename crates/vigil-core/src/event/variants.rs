use std::ops::{Deref, DerefMut};

use super::{EventBase, FileSlot};
use crate::constants::MAX_IMAGE_NAME_CHARS;
use crate::error::VigilResult;
use crate::raw::{
    CreateProcessDebugInfo, CreateThreadDebugInfo, ExitProcessDebugInfo, ExitThreadDebugInfo, LoadDllDebugInfo,
    OutputDebugStringInfo, RipInfo, UnloadDllDebugInfo,
};
use crate::session::DebugSession;
use crate::types::{Address, FileHandle, Module, ProcessHandle, ProcessId, ThreadHandle};

macro_rules! deref_to_base {
    ($($event:ident),+ $(,)?) => {
        $(
            impl<'a> Deref for $event<'a>
            {
                type Target = EventBase<'a>;

                fn deref(&self) -> &Self::Target
                {
                    &self.base
                }
            }

            impl DerefMut for $event<'_>
            {
                fn deref_mut(&mut self) -> &mut Self::Target
                {
                    &mut self.base
                }
            }
        )+
    };
}

deref_to_base!(
    CreateThreadEvent,
    CreateProcessEvent,
    ExitThreadEvent,
    ExitProcessEvent,
    LoadDllEvent,
    UnloadDllEvent,
    OutputDebugStringEvent,
    RipEvent,
    UnknownEvent,
);

fn non_empty(name: Option<String>) -> Option<String>
{
    name.filter(|name| !name.is_empty())
}

/// Follow an `lpImageName` pointer: a pointer in the target to a pointer to the name.
fn remote_image_name(session: &DebugSession, pid: ProcessId, pointer: Address, unicode: bool) -> Option<String>
{
    if pointer.is_null() {
        return None;
    }
    let target = session.target();
    let name = target.read_pointer(pid, pointer).ok().filter(|name| !name.is_null())?;
    non_empty(target.read_string(pid, name, unicode, MAX_IMAGE_NAME_CHARS).ok())
}

/// The `nDebugInfoSize` bytes at `base + dwDebugInfoFileOffset`, if all are readable.
fn debug_info_at(session: &DebugSession, pid: ProcessId, base: Address, offset: u32, size: u32) -> Option<Vec<u8>>
{
    let size = usize::try_from(size).ok().filter(|size| *size > 0)?;
    let address = base.checked_add(u64::from(offset))?;
    session.target().read_memory(pid, address, size).ok().filter(|data| data.len() == size)
}

fn snapshot_module(session: &DebugSession, pid: ProcessId, base: Address) -> Option<&Module>
{
    session.system().process(pid)?.module(base)
}

/// A thread started in an existing process (`CREATE_THREAD_DEBUG_EVENT`).
#[derive(Debug)]
pub struct CreateThreadEvent<'a>
{
    pub(crate) base: EventBase<'a>,
    info: CreateThreadDebugInfo,
}

impl<'a> CreateThreadEvent<'a>
{
    pub(crate) fn new(base: EventBase<'a>, info: CreateThreadDebugInfo) -> Self
    {
        Self { base, info }
    }

    /// Borrowed from the OS; the engine never closes it.
    #[must_use]
    pub fn thread_handle(&self) -> Option<ThreadHandle>
    {
        ThreadHandle::from_raw(self.info.thread_handle)
    }

    /// Thread environment block.
    #[must_use]
    pub fn teb(&self) -> Address
    {
        self.info.thread_local_base
    }

    #[must_use]
    pub fn start_address(&self) -> Address
    {
        self.info.start_address
    }
}

/// A new process and its main thread (`CREATE_PROCESS_DEBUG_EVENT`).
///
/// Owns the image file handle from the payload until dropped or until
/// [`take_file_handle`](Self::take_file_handle) is called.
#[derive(Debug)]
pub struct CreateProcessEvent<'a>
{
    pub(crate) base: EventBase<'a>,
    info: CreateProcessDebugInfo,
    file: FileSlot,
}

impl<'a> CreateProcessEvent<'a>
{
    pub(crate) fn new(base: EventBase<'a>, info: CreateProcessDebugInfo) -> Self
    {
        Self {
            base,
            info,
            file: FileSlot::Pending(info.file_handle),
        }
    }

    /// Handle to the executable image. Repeated calls return the same handle.
    pub fn file_handle(&mut self) -> Option<FileHandle>
    {
        self.file.get()
    }

    /// Take ownership of the image handle; the event will no longer close it.
    pub fn take_file_handle(&mut self) -> Option<FileHandle>
    {
        self.file.take()
    }

    #[must_use]
    pub fn process_handle(&self) -> Option<ProcessHandle>
    {
        ProcessHandle::from_raw(self.info.process_handle)
    }

    #[must_use]
    pub fn thread_handle(&self) -> Option<ThreadHandle>
    {
        ThreadHandle::from_raw(self.info.thread_handle)
    }

    #[must_use]
    pub fn start_address(&self) -> Address
    {
        self.info.start_address
    }

    #[must_use]
    pub fn image_base(&self) -> Address
    {
        self.info.base_of_image
    }

    /// Same as [`image_base`](Self::image_base).
    #[must_use]
    pub fn module_base(&self) -> Address
    {
        self.image_base()
    }

    /// TEB of the main thread.
    #[must_use]
    pub fn teb(&self) -> Address
    {
        self.info.thread_local_base
    }

    /// Raw debugging information, or `None` if there is none or it could not
    /// be read in full.
    #[must_use]
    pub fn debug_info(&self) -> Option<Vec<u8>>
    {
        debug_info_at(
            self.base.session(),
            self.base.pid(),
            self.info.base_of_image,
            self.info.debug_info_file_offset,
            self.info.debug_info_size,
        )
    }

    /// Best-effort path of the main executable.
    ///
    /// Tries the file handle, then the `lpImageName` pointer in the target,
    /// then asks the target for the process image name. Empty names count as
    /// failures.
    pub fn filename(&mut self) -> Option<String>
    {
        let pid = self.base.pid();
        let from_handle = self.file.get().and_then(|handle| self.base.session().target().file_name(handle));
        if let Some(name) = non_empty(from_handle) {
            return Some(name);
        }

        let session = self.base.session();
        remote_image_name(session, pid, self.info.image_name, self.info.unicode)
            .or_else(|| non_empty(session.target().process_image_name(pid)))
    }

    /// The main module, if the snapshot knows it.
    #[must_use]
    pub fn module(&self) -> Option<&Module>
    {
        snapshot_module(self.base.session(), self.base.pid(), self.module_base())
    }
}

impl Drop for CreateProcessEvent<'_>
{
    fn drop(&mut self)
    {
        self.file.close(self.base.session_mut());
    }
}

/// A thread exited (`EXIT_THREAD_DEBUG_EVENT`).
#[derive(Debug)]
pub struct ExitThreadEvent<'a>
{
    pub(crate) base: EventBase<'a>,
    info: ExitThreadDebugInfo,
}

impl<'a> ExitThreadEvent<'a>
{
    pub(crate) fn new(base: EventBase<'a>, info: ExitThreadDebugInfo) -> Self
    {
        Self { base, info }
    }

    #[must_use]
    pub fn exit_code(&self) -> u32
    {
        self.info.exit_code
    }
}

/// A process exited (`EXIT_PROCESS_DEBUG_EVENT`).
#[derive(Debug)]
pub struct ExitProcessEvent<'a>
{
    pub(crate) base: EventBase<'a>,
    info: ExitProcessDebugInfo,
}

impl<'a> ExitProcessEvent<'a>
{
    pub(crate) fn new(base: EventBase<'a>, info: ExitProcessDebugInfo) -> Self
    {
        Self { base, info }
    }

    #[must_use]
    pub fn exit_code(&self) -> u32
    {
        self.info.exit_code
    }
}

/// A DLL was mapped into a process (`LOAD_DLL_DEBUG_EVENT`).
///
/// Owns the DLL file handle from the payload, like [`CreateProcessEvent`].
#[derive(Debug)]
pub struct LoadDllEvent<'a>
{
    pub(crate) base: EventBase<'a>,
    info: LoadDllDebugInfo,
    file: FileSlot,
}

impl<'a> LoadDllEvent<'a>
{
    pub(crate) fn new(base: EventBase<'a>, info: LoadDllDebugInfo) -> Self
    {
        Self {
            base,
            info,
            file: FileSlot::Pending(info.file_handle),
        }
    }

    #[must_use]
    pub fn module_base(&self) -> Address
    {
        self.info.base_of_dll
    }

    /// The loaded module, if the snapshot knows it.
    #[must_use]
    pub fn module(&self) -> Option<&Module>
    {
        snapshot_module(self.base.session(), self.base.pid(), self.module_base())
    }

    /// Handle to the DLL image. Repeated calls return the same handle.
    pub fn file_handle(&mut self) -> Option<FileHandle>
    {
        self.file.get()
    }

    /// Take ownership of the DLL handle; the event will no longer close it.
    pub fn take_file_handle(&mut self) -> Option<FileHandle>
    {
        self.file.take()
    }

    /// Raw debugging information embedded in the DLL image, if fully readable.
    #[must_use]
    pub fn debug_info(&self) -> Option<Vec<u8>>
    {
        debug_info_at(
            self.base.session(),
            self.base.pid(),
            self.info.base_of_dll,
            self.info.debug_info_file_offset,
            self.info.debug_info_size,
        )
    }

    /// Best-effort path of the DLL: the file handle first, then the
    /// `lpImageName` pointer in the target.
    pub fn filename(&mut self) -> Option<String>
    {
        let pid = self.base.pid();
        let from_handle = self.file.get().and_then(|handle| self.base.session().target().file_name(handle));
        if let Some(name) = non_empty(from_handle) {
            return Some(name);
        }
        remote_image_name(self.base.session(), pid, self.info.image_name, self.info.unicode)
    }
}

impl Drop for LoadDllEvent<'_>
{
    fn drop(&mut self)
    {
        self.file.close(self.base.session_mut());
    }
}

/// A DLL was unmapped (`UNLOAD_DLL_DEBUG_EVENT`).
#[derive(Debug)]
pub struct UnloadDllEvent<'a>
{
    pub(crate) base: EventBase<'a>,
    info: UnloadDllDebugInfo,
}

impl<'a> UnloadDllEvent<'a>
{
    pub(crate) fn new(base: EventBase<'a>, info: UnloadDllDebugInfo) -> Self
    {
        Self { base, info }
    }

    #[must_use]
    pub fn module_base(&self) -> Address
    {
        self.info.base_of_dll
    }

    /// The unloaded module. Still present while the user handler runs; the
    /// snapshot drops it afterwards.
    #[must_use]
    pub fn module(&self) -> Option<&Module>
    {
        snapshot_module(self.base.session(), self.base.pid(), self.module_base())
    }
}

/// `OutputDebugString` was called in the target (`OUTPUT_DEBUG_STRING_EVENT`).
#[derive(Debug)]
pub struct OutputDebugStringEvent<'a>
{
    pub(crate) base: EventBase<'a>,
    info: OutputDebugStringInfo,
}

impl<'a> OutputDebugStringEvent<'a>
{
    pub(crate) fn new(base: EventBase<'a>, info: OutputDebugStringInfo) -> Self
    {
        Self { base, info }
    }

    #[must_use]
    pub fn is_unicode(&self) -> bool
    {
        self.info.unicode
    }

    /// The string sent by the target, without its trailing NUL.
    ///
    /// # Errors
    ///
    /// Whatever the target's memory reader reports.
    pub fn debug_string(&self) -> VigilResult<String>
    {
        self.base.session().target().read_string(
            self.base.pid(),
            self.info.data,
            self.info.unicode,
            usize::from(self.info.length),
        )
    }
}

/// The system debugger died unexpectedly (`RIP_EVENT`).
#[derive(Debug)]
pub struct RipEvent<'a>
{
    pub(crate) base: EventBase<'a>,
    info: RipInfo,
}

impl<'a> RipEvent<'a>
{
    pub(crate) fn new(base: EventBase<'a>, info: RipInfo) -> Self
    {
        Self { base, info }
    }

    #[must_use]
    pub fn rip_error(&self) -> u32
    {
        self.info.error
    }

    /// `SLE_ERROR`, `SLE_MINORERROR`, `SLE_WARNING`, or 0.
    #[must_use]
    pub fn rip_type(&self) -> u32
    {
        self.info.kind
    }
}

/// An event code the engine does not recognize.
#[derive(Debug)]
pub struct UnknownEvent<'a>
{
    pub(crate) base: EventBase<'a>,
}

impl<'a> UnknownEvent<'a>
{
    pub(crate) fn new(base: EventBase<'a>) -> Self
    {
        Self { base }
    }
}
