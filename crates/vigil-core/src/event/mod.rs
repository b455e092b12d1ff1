//! # Debug Events
//!
//! Typed views over a [`RawEvent`](crate::raw::RawEvent).
//!
//! [`EventFactory::get`] turns a raw notification into an [`Event`], one
//! variant per debug event code plus [`Event::Unknown`] for codes the engine
//! does not recognize. Every variant wraps an [`EventBase`] that carries:
//!
//! - a mutable borrow of the owning [`DebugSession`], so accessors can consult
//!   the snapshot and the target
//! - the process and thread the event came from
//! - the continue status that will be handed to `ContinueDebugEvent`
//!
//! Variants deref to [`EventBase`], so the shared accessors are available on
//! every one of them.
//!
//! ## Lifecycle
//!
//! An event lives for one dispatch cycle:
//!
//! 1. The caller receives a raw notification from the OS
//! 2. `EventFactory::get` builds the event
//! 3. [`EventDispatcher::dispatch`](crate::dispatcher::EventDispatcher::dispatch)
//!    runs bookkeeping and the user's handler; both may change the continue status
//! 4. The caller reads [`Event::continue_status`] once, resumes the target and
//!    drops the event
//!
//! Process creation and DLL load events own a file handle to the image. It is
//! closed when the event is dropped unless the caller took it with
//! `take_file_handle`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use vigil_core::event::{ContinueStatus, Event, EventFactory};
//! use vigil_core::raw::RawEvent;
//! use vigil_core::session::DebugSession;
//!
//! fn on_notification(session: &mut DebugSession, raw: RawEvent) -> ContinueStatus
//! {
//!     let mut event = EventFactory::get(session, raw);
//!     if let Event::Exception(exception) = &mut event {
//!         if exception.is_first_chance() {
//!             exception.set_continue_status(ContinueStatus::ExceptionNotHandled);
//!         }
//!     }
//!     event.continue_status()
//! }
//! ```

mod exception;
mod factory;
pub mod kind;
mod variants;

use std::fmt;

pub use exception::{AccessViolationType, ExceptionEvent, ThreadNameInfo};
pub use factory::EventFactory;
pub use kind::{DebugEventKind, ExceptionKind, UNKNOWN_EVENT_NAME};
pub use variants::{
    CreateProcessEvent, CreateThreadEvent, ExitProcessEvent, ExitThreadEvent, LoadDllEvent, OutputDebugStringEvent,
    RipEvent, UnknownEvent, UnloadDllEvent,
};

use tracing::warn;

use crate::constants::{DBG_CONTINUE, DBG_EXCEPTION_HANDLED, DBG_EXCEPTION_NOT_HANDLED};
use crate::session::DebugSession;
use crate::types::{FileHandle, Process, ProcessId, RawHandle, Thread, ThreadId};

/// How the target should be resumed after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContinueStatus
{
    /// `DBG_CONTINUE`: the debugger dealt with the event.
    Continue,
    /// `DBG_EXCEPTION_HANDLED`
    ExceptionHandled,
    /// `DBG_EXCEPTION_NOT_HANDLED`: let the target's own handlers run.
    #[default]
    ExceptionNotHandled,
}

impl ContinueStatus
{
    /// Value to pass to `ContinueDebugEvent`.
    #[must_use]
    pub fn as_raw(self) -> u32
    {
        match self {
            Self::Continue => DBG_CONTINUE,
            Self::ExceptionHandled => DBG_EXCEPTION_HANDLED,
            Self::ExceptionNotHandled => DBG_EXCEPTION_NOT_HANDLED,
        }
    }

    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self>
    {
        match raw {
            DBG_CONTINUE => Some(Self::Continue),
            DBG_EXCEPTION_HANDLED => Some(Self::ExceptionHandled),
            DBG_EXCEPTION_NOT_HANDLED => Some(Self::ExceptionNotHandled),
            _ => None,
        }
    }
}

/// State shared by every event variant.
pub struct EventBase<'a>
{
    session: &'a mut DebugSession,
    code: u32,
    pid: ProcessId,
    tid: ThreadId,
    continue_status: ContinueStatus,
}

impl<'a> EventBase<'a>
{
    pub(crate) fn new(session: &'a mut DebugSession, code: u32, pid: ProcessId, tid: ThreadId) -> Self
    {
        Self {
            session,
            code,
            pid,
            tid,
            continue_status: ContinueStatus::default(),
        }
    }

    /// `dwDebugEventCode`
    #[must_use]
    pub fn code(&self) -> u32
    {
        self.code
    }

    /// The event's kind, or `None` for an unrecognized code.
    #[must_use]
    pub fn kind(&self) -> Option<DebugEventKind>
    {
        DebugEventKind::from_code(self.code)
    }

    #[must_use]
    pub fn pid(&self) -> ProcessId
    {
        self.pid
    }

    #[must_use]
    pub fn tid(&self) -> ThreadId
    {
        self.tid
    }

    /// User-friendly name, e.g. "Thread creation event".
    #[must_use]
    pub fn event_name(&self) -> &'static str
    {
        self.kind().map_or(UNKNOWN_EVENT_NAME, DebugEventKind::event_name)
    }

    #[must_use]
    pub fn session(&self) -> &DebugSession
    {
        &*self.session
    }

    pub fn session_mut(&mut self) -> &mut DebugSession
    {
        &mut *self.session
    }

    /// The originating process, registering a placeholder if the snapshot
    /// has not seen it yet.
    pub fn process(&mut self) -> &mut Process
    {
        self.session.system_mut().get_or_create_process(self.pid)
    }

    /// The originating thread, registering placeholders for it (and its
    /// process) if the snapshot has not seen them yet.
    pub fn thread(&mut self) -> &mut Thread
    {
        let tid = self.tid;
        self.process().get_or_create_thread(tid)
    }

    #[must_use]
    pub fn continue_status(&self) -> ContinueStatus
    {
        self.continue_status
    }

    pub fn set_continue_status(&mut self, status: ContinueStatus)
    {
        self.continue_status = status;
    }
}

impl fmt::Debug for EventBase<'_>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("EventBase")
            .field("code", &self.code)
            .field("pid", &self.pid)
            .field("tid", &self.tid)
            .field("continue_status", &self.continue_status)
            .finish_non_exhaustive()
    }
}

/// A file handle delivered in an event payload, validated on first use.
#[derive(Debug)]
pub(crate) enum FileSlot
{
    /// Not looked at yet.
    Pending(RawHandle),
    /// Valid and owned by the event.
    Open(FileHandle),
    /// Invalid, taken by the caller, or closed.
    Released,
}

impl FileSlot
{
    pub(crate) fn get(&mut self) -> Option<FileHandle>
    {
        if let Self::Pending(raw) = *self {
            *self = FileHandle::from_raw(raw).map_or(Self::Released, Self::Open);
        }
        match self {
            Self::Open(handle) => Some(*handle),
            _ => None,
        }
    }

    pub(crate) fn take(&mut self) -> Option<FileHandle>
    {
        let handle = self.get();
        *self = Self::Released;
        handle
    }

    pub(crate) fn close(&mut self, session: &mut DebugSession)
    {
        if let Some(handle) = self.take() {
            if let Err(err) = session.target_mut().close_handle(handle) {
                warn!(handle = %handle, error = %err, "failed to close event file handle");
            }
        }
    }
}

/// A debug event, one variant per event code.
#[derive(Debug)]
pub enum Event<'a>
{
    Exception(ExceptionEvent<'a>),
    CreateThread(CreateThreadEvent<'a>),
    CreateProcess(CreateProcessEvent<'a>),
    ExitThread(ExitThreadEvent<'a>),
    ExitProcess(ExitProcessEvent<'a>),
    LoadDll(LoadDllEvent<'a>),
    UnloadDll(UnloadDllEvent<'a>),
    OutputDebugString(OutputDebugStringEvent<'a>),
    Rip(RipEvent<'a>),
    Unknown(UnknownEvent<'a>),
}

impl<'a> Event<'a>
{
    /// Shared state of whichever variant this is.
    #[must_use]
    pub fn base(&self) -> &EventBase<'a>
    {
        match self {
            Self::Exception(e) => &e.base,
            Self::CreateThread(e) => &e.base,
            Self::CreateProcess(e) => &e.base,
            Self::ExitThread(e) => &e.base,
            Self::ExitProcess(e) => &e.base,
            Self::LoadDll(e) => &e.base,
            Self::UnloadDll(e) => &e.base,
            Self::OutputDebugString(e) => &e.base,
            Self::Rip(e) => &e.base,
            Self::Unknown(e) => &e.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut EventBase<'a>
    {
        match self {
            Self::Exception(e) => &mut e.base,
            Self::CreateThread(e) => &mut e.base,
            Self::CreateProcess(e) => &mut e.base,
            Self::ExitThread(e) => &mut e.base,
            Self::ExitProcess(e) => &mut e.base,
            Self::LoadDll(e) => &mut e.base,
            Self::UnloadDll(e) => &mut e.base,
            Self::OutputDebugString(e) => &mut e.base,
            Self::Rip(e) => &mut e.base,
            Self::Unknown(e) => &mut e.base,
        }
    }

    #[must_use]
    pub fn code(&self) -> u32
    {
        self.base().code()
    }

    #[must_use]
    pub fn pid(&self) -> ProcessId
    {
        self.base().pid()
    }

    #[must_use]
    pub fn tid(&self) -> ThreadId
    {
        self.base().tid()
    }

    #[must_use]
    pub fn event_name(&self) -> &'static str
    {
        self.base().event_name()
    }

    #[must_use]
    pub fn continue_status(&self) -> ContinueStatus
    {
        self.base().continue_status()
    }

    pub fn set_continue_status(&mut self, status: ContinueStatus)
    {
        self.base_mut().set_continue_status(status);
    }

    pub fn process(&mut self) -> &mut Process
    {
        self.base_mut().process()
    }

    pub fn thread(&mut self) -> &mut Thread
    {
        self.base_mut().thread()
    }

    /// The exception code, for exception events.
    #[must_use]
    pub fn exception_code(&self) -> Option<u32>
    {
        self.as_exception().map(ExceptionEvent::exception_code)
    }

    #[must_use]
    pub fn as_exception(&self) -> Option<&ExceptionEvent<'a>>
    {
        match self {
            Self::Exception(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_exception_mut(&mut self) -> Option<&mut ExceptionEvent<'a>>
    {
        match self {
            Self::Exception(e) => Some(e),
            _ => None,
        }
    }

    /// Best-effort image path for process creation and DLL load events.
    ///
    /// `None` for every other event, and when no strategy found a name.
    pub fn filename(&mut self) -> Option<String>
    {
        match self {
            Self::CreateProcess(e) => e.filename(),
            Self::LoadDll(e) => e.filename(),
            _ => None,
        }
    }
}
