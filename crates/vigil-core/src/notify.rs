//! Session bookkeeping run around the user's handler.
//!
//! Some events need the session's attention whether or not the user handles
//! them: a new thread must be in the snapshot before the handler looks it up,
//! and an exited process must leave the snapshot once everybody is done with
//! it. The [`EventDispatcher`](crate::dispatcher::EventDispatcher) runs these
//! routines as pre- and post-handlers.
//!
//! | Routine | Runs | Trigger |
//! |---|---|---|
//! | `create_thread`, `create_process`, `load_dll` | before | event code |
//! | `breakpoint`, `single_step`, `guard_page`, `debug_control_c`, `ms_vc_exception` | before | exception code |
//! | `exit_thread`, `exit_process`, `unload_dll`, `rip` | after | event code |
//!
//! No code has both a pre- and a post-routine.

use tracing::debug;

use crate::constants::{
    CREATE_PROCESS_DEBUG_EVENT, CREATE_THREAD_DEBUG_EVENT, DBG_CONTROL_C, EXCEPTION_BREAKPOINT, EXCEPTION_GUARD_PAGE,
    EXCEPTION_SINGLE_STEP, EXIT_PROCESS_DEBUG_EVENT, EXIT_THREAD_DEBUG_EVENT, LOAD_DLL_DEBUG_EVENT, MS_VC_EXCEPTION,
    RIP_EVENT, UNLOAD_DLL_DEBUG_EVENT,
};
use crate::error::VigilResult;
use crate::event::{
    ContinueStatus, CreateProcessEvent, CreateThreadEvent, Event, EventBase, ExceptionEvent, LoadDllEvent,
};
use crate::platform::TrapKind;
use crate::types::{Address, Module};

const MAX_THREAD_NAME_CHARS: usize = 0x1000;

/// A bookkeeping routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyRoutine
{
    CreateThread,
    CreateProcess,
    LoadDll,
    ExitThread,
    ExitProcess,
    UnloadDll,
    Rip,
    Breakpoint,
    SingleStep,
    GuardPage,
    DebugControlC,
    MsVcException,
}

impl NotifyRoutine
{
    /// Pre-handler keyed by exception code.
    #[must_use]
    pub fn pre_exception(code: u32) -> Option<Self>
    {
        match code {
            EXCEPTION_BREAKPOINT => Some(Self::Breakpoint),
            EXCEPTION_SINGLE_STEP => Some(Self::SingleStep),
            EXCEPTION_GUARD_PAGE => Some(Self::GuardPage),
            DBG_CONTROL_C => Some(Self::DebugControlC),
            MS_VC_EXCEPTION => Some(Self::MsVcException),
            _ => None,
        }
    }

    /// Pre-handler keyed by event code.
    #[must_use]
    pub fn pre_event(code: u32) -> Option<Self>
    {
        match code {
            CREATE_THREAD_DEBUG_EVENT => Some(Self::CreateThread),
            CREATE_PROCESS_DEBUG_EVENT => Some(Self::CreateProcess),
            LOAD_DLL_DEBUG_EVENT => Some(Self::LoadDll),
            _ => None,
        }
    }

    /// Post-handler keyed by exception code. No exception has one.
    #[must_use]
    pub fn post_exception(_code: u32) -> Option<Self>
    {
        None
    }

    /// Post-handler keyed by event code.
    #[must_use]
    pub fn post_event(code: u32) -> Option<Self>
    {
        match code {
            EXIT_THREAD_DEBUG_EVENT => Some(Self::ExitThread),
            EXIT_PROCESS_DEBUG_EVENT => Some(Self::ExitProcess),
            UNLOAD_DLL_DEBUG_EVENT => Some(Self::UnloadDll),
            RIP_EVENT => Some(Self::Rip),
            _ => None,
        }
    }

    /// The pre-handler for an event. The exception table wins over the event table.
    #[must_use]
    pub fn pre(event_code: u32, exception_code: Option<u32>) -> Option<Self>
    {
        exception_code.and_then(Self::pre_exception).or_else(|| Self::pre_event(event_code))
    }

    /// The post-handler for an event. The exception table wins over the event table.
    #[must_use]
    pub fn post(event_code: u32, exception_code: Option<u32>) -> Option<Self>
    {
        exception_code.and_then(Self::post_exception).or_else(|| Self::post_event(event_code))
    }

    #[must_use]
    pub fn name(self) -> &'static str
    {
        match self {
            Self::CreateThread => "create_thread",
            Self::CreateProcess => "create_process",
            Self::LoadDll => "load_dll",
            Self::ExitThread => "exit_thread",
            Self::ExitProcess => "exit_process",
            Self::UnloadDll => "unload_dll",
            Self::Rip => "rip",
            Self::Breakpoint => "breakpoint",
            Self::SingleStep => "single_step",
            Self::GuardPage => "guard_page",
            Self::DebugControlC => "debug_control_c",
            Self::MsVcException => "ms_vc_exception",
        }
    }

    /// Run the routine. Returns whether the user handler should run.
    ///
    /// A routine paired with an event of another variant does nothing.
    ///
    /// # Errors
    ///
    /// Failures of the breakpoint oracle; every other routine is infallible.
    pub fn run(self, event: &mut Event<'_>) -> VigilResult<bool>
    {
        match (self, event) {
            (Self::CreateThread, Event::CreateThread(e)) => Ok(create_thread(e)),
            (Self::CreateProcess, Event::CreateProcess(e)) => Ok(create_process(e)),
            (Self::LoadDll, Event::LoadDll(e)) => Ok(load_dll(e)),
            (Self::ExitThread, Event::ExitThread(e)) => Ok(exit_thread(e)),
            (Self::ExitProcess, Event::ExitProcess(e)) => Ok(remove_process(e)),
            (Self::Rip, Event::Rip(e)) => Ok(remove_process(e)),
            (Self::UnloadDll, Event::UnloadDll(e)) => {
                let base = e.module_base();
                Ok(unload_dll(e, base))
            }
            (Self::Breakpoint, Event::Exception(e)) => trap(e, TrapKind::Breakpoint),
            (Self::SingleStep, Event::Exception(e)) => trap(e, TrapKind::SingleStep),
            (Self::GuardPage, Event::Exception(e)) => trap(e, TrapKind::GuardPage),
            (Self::DebugControlC, Event::Exception(e)) => Ok(debug_control_c(e)),
            (Self::MsVcException, Event::Exception(e)) => Ok(ms_vc_exception(e)),
            _ => Ok(true),
        }
    }
}

fn non_null(address: Address) -> Option<Address>
{
    (!address.is_null()).then_some(address)
}

fn create_thread(event: &mut CreateThreadEvent<'_>) -> bool
{
    let (teb, start) = (event.teb(), event.start_address());
    let thread = event.thread();
    thread.teb = non_null(teb);
    thread.start_address = non_null(start);
    true
}

fn create_process(event: &mut CreateProcessEvent<'_>) -> bool
{
    let filename = event.filename();
    let (base, teb, start) = (event.image_base(), event.teb(), event.start_address());
    let tid = event.tid();
    debug!(pid = event.pid().0, image = ?filename, base = %base, "process created");

    let process = event.process();
    if filename.is_some() {
        process.image_name.clone_from(&filename);
    }
    process.add_module(Module::new(base, filename));

    let thread = process.get_or_create_thread(tid);
    thread.teb = non_null(teb);
    thread.start_address = non_null(start);
    true
}

fn load_dll(event: &mut LoadDllEvent<'_>) -> bool
{
    let filename = event.filename();
    let base = event.module_base();
    debug!(pid = event.pid().0, module = ?filename, base = %base, "module loaded");
    event.process().add_module(Module::new(base, filename));
    true
}

fn exit_thread(event: &mut EventBase<'_>) -> bool
{
    let (pid, tid) = (event.pid(), event.tid());
    if let Some(process) = event.session_mut().system_mut().process_mut(pid) {
        process.remove_thread(tid);
    }
    true
}

fn remove_process(event: &mut EventBase<'_>) -> bool
{
    let pid = event.pid();
    if event.session_mut().system_mut().remove_process(pid).is_some() {
        debug!(pid = pid.0, "process removed from snapshot");
    }
    true
}

fn unload_dll(event: &mut EventBase<'_>, base: Address) -> bool
{
    let pid = event.pid();
    if let Some(process) = event.session_mut().system_mut().process_mut(pid) {
        process.remove_module(base);
    }
    true
}

/// Breakpoints planted by the debugger are resumed with `DBG_CONTINUE`.
fn trap(event: &mut ExceptionEvent<'_>, kind: TrapKind) -> VigilResult<bool>
{
    let (pid, tid, address) = (event.pid(), event.tid(), event.exception_address());
    if event.session().target().owns_trap(pid, tid, kind, address)? {
        event.set_continue_status(ContinueStatus::Continue);
    }
    Ok(true)
}

fn debug_control_c(event: &mut ExceptionEvent<'_>) -> bool
{
    if event.is_first_chance() {
        event.set_continue_status(ContinueStatus::ExceptionHandled);
    }
    true
}

fn ms_vc_exception(event: &mut ExceptionEvent<'_>) -> bool
{
    let Some(info) = event.thread_name_info() else {
        return true;
    };

    let pid = event.pid();
    let name = event.session().target().read_string(pid, info.name, false, MAX_THREAD_NAME_CHARS).ok();
    let Some(name) = name.filter(|name| !name.is_empty()) else {
        return true;
    };

    let tid = info.thread.unwrap_or(event.tid());
    debug!(pid = pid.0, tid = tid.0, name = %name, "thread named");
    event.process().get_or_create_thread(tid).name = Some(name);
    true
}
