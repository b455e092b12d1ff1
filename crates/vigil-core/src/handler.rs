//! # Event Handlers
//!
//! User code reacts to debug events by implementing [`EventHandler`]. The
//! trait has one method per canonical handler name. Every method has a
//! default that forwards to a more general one, so an implementation only
//! overrides what it cares about:
//!
//! ```text
//! access_violation, breakpoint, ... ─┐
//! unknown_exception ─────────────────┴─> exception ─┐
//! create_process, load_dll, ... ────────────────────┤
//! unknown_event ────────────────────────────────────┴─> event (no-op)
//! ```
//!
//! [`HandlerDispatch`] picks the method for an event with [`HandlerName::resolve`]
//! and, on DLL loads, activates the API hooks the handler declared. Traps the
//! target reports as hook hits go to [`EventHandler::api_hook_entry`] or
//! [`EventHandler::api_hook_exit`] instead of the trap's own handler.
//!
//! ## Example
//!
//! ```rust
//! use vigil_core::error::VigilResult;
//! use vigil_core::event::{ContinueStatus, Event};
//! use vigil_core::handler::EventHandler;
//! use vigil_core::hooks::ApiHookTable;
//!
//! #[derive(Default)]
//! struct CrashLogger
//! {
//!     crashes: usize,
//! }
//!
//! impl EventHandler for CrashLogger
//! {
//!     type Output = ();
//!
//!     fn api_hooks(&self) -> ApiHookTable
//!     {
//!         &[("kernel32.dll", &[("CreateFileW", 7)])]
//!     }
//!
//!     fn access_violation(&mut self, event: &mut Event<'_>) -> VigilResult<()>
//!     {
//!         if event.as_exception().is_some_and(|e| e.is_last_chance()) {
//!             self.crashes += 1;
//!         }
//!         Ok(())
//!     }
//!
//!     fn breakpoint(&mut self, event: &mut Event<'_>) -> VigilResult<()>
//!     {
//!         event.set_continue_status(ContinueStatus::Continue);
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use tracing::trace;

use crate::constants::{
    CONTROL_C_EXIT, CREATE_PROCESS_DEBUG_EVENT, CREATE_THREAD_DEBUG_EVENT, DBG_CONTROL_C, EXCEPTION_ACCESS_VIOLATION,
    EXCEPTION_ARRAY_BOUNDS_EXCEEDED, EXCEPTION_BREAKPOINT, EXCEPTION_DATATYPE_MISALIGNMENT, EXCEPTION_DEBUG_EVENT,
    EXCEPTION_FLT_DENORMAL_OPERAND, EXCEPTION_FLT_DIVIDE_BY_ZERO, EXCEPTION_FLT_INEXACT_RESULT,
    EXCEPTION_FLT_INVALID_OPERATION, EXCEPTION_FLT_OVERFLOW, EXCEPTION_FLT_STACK_CHECK, EXCEPTION_FLT_UNDERFLOW,
    EXCEPTION_GUARD_PAGE, EXCEPTION_ILLEGAL_INSTRUCTION, EXCEPTION_INT_DIVIDE_BY_ZERO, EXCEPTION_INT_OVERFLOW,
    EXCEPTION_INVALID_DISPOSITION, EXCEPTION_INVALID_HANDLE, EXCEPTION_IN_PAGE_ERROR, EXCEPTION_NONCONTINUABLE_EXCEPTION,
    EXCEPTION_POSSIBLE_DEADLOCK, EXCEPTION_PRIV_INSTRUCTION, EXCEPTION_SINGLE_STEP, EXCEPTION_STACK_OVERFLOW,
    EXIT_PROCESS_DEBUG_EVENT, EXIT_THREAD_DEBUG_EVENT, LOAD_DLL_DEBUG_EVENT, MS_VC_EXCEPTION, OUTPUT_DEBUG_STRING_EVENT,
    RIP_EVENT, UNLOAD_DLL_DEBUG_EVENT,
};
use crate::error::VigilResult;
use crate::event::{Event, LoadDllEvent};
use crate::hooks::{build_api_hooks, find_installed_hook, ApiHook, ApiHookCall, ApiHookHit, ApiHookSpec, ApiHookTable};
use crate::types::{file_name_from_path, Address, ProcessId};

macro_rules! handler_names {
    ($($variant:ident => $name:ident, $fallback:ident;)+) => {
        /// Canonical handler names, one per [`EventHandler`] method.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum HandlerName
        {
            $($variant,)+
        }

        impl HandlerName
        {
            /// Every name, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// The method name, e.g. `create_process`.
            #[must_use]
            pub fn as_str(self) -> &'static str
            {
                match self {
                    $(Self::$variant => stringify!($name),)+
                }
            }

            /// The name this one falls back to when not overridden; `None` for `event`.
            #[must_use]
            pub fn fallback(self) -> Option<Self>
            {
                match self {
                    $(Self::$variant => handler_names!(@fallback $fallback),)+
                }
            }

            /// Call the handler method this name stands for.
            pub fn invoke<H: EventHandler + ?Sized>(self, handler: &mut H, event: &mut Event<'_>) -> VigilResult<H::Output>
            {
                match self {
                    $(Self::$variant => handler.$name(event),)+
                }
            }
        }
    };
    (@fallback none) => { None };
    (@fallback $fallback:ident) => { Some(Self::$fallback) };
}

handler_names! {
    Event => event, none;
    Exception => exception, Event;
    UnknownEvent => unknown_event, Event;
    CreateThread => create_thread, Event;
    CreateProcess => create_process, Event;
    ExitThread => exit_thread, Event;
    ExitProcess => exit_process, Event;
    LoadDll => load_dll, Event;
    UnloadDll => unload_dll, Event;
    OutputString => output_string, Event;
    Rip => rip, Event;
    UnknownException => unknown_exception, Exception;
    AccessViolation => access_violation, Exception;
    ArrayBoundsExceeded => array_bounds_exceeded, Exception;
    Breakpoint => breakpoint, Exception;
    DatatypeMisalignment => datatype_misalignment, Exception;
    FloatDenormalOperand => float_denormal_operand, Exception;
    FloatDivideByZero => float_divide_by_zero, Exception;
    FloatInexactResult => float_inexact_result, Exception;
    FloatInvalidOperation => float_invalid_operation, Exception;
    FloatOverflow => float_overflow, Exception;
    FloatStackCheck => float_stack_check, Exception;
    FloatUnderflow => float_underflow, Exception;
    IllegalInstruction => illegal_instruction, Exception;
    InPageError => in_page_error, Exception;
    IntegerDivideByZero => integer_divide_by_zero, Exception;
    IntegerOverflow => integer_overflow, Exception;
    InvalidDisposition => invalid_disposition, Exception;
    NoncontinuableException => noncontinuable_exception, Exception;
    PrivilegedInstruction => privileged_instruction, Exception;
    SingleStep => single_step, Exception;
    StackOverflow => stack_overflow, Exception;
    GuardPage => guard_page, Exception;
    InvalidHandle => invalid_handle, Exception;
    PossibleDeadlock => possible_deadlock, Exception;
    ControlCExit => control_c_exit, Exception;
    DebugControlC => debug_control_c, Exception;
    MsVcException => ms_vc_exception, Exception;
}

impl HandlerName
{
    /// Handler for an event code; `unknown_event` when the code is not in the table.
    #[must_use]
    pub fn for_event_code(code: u32) -> Self
    {
        match code {
            EXCEPTION_DEBUG_EVENT => Self::Exception,
            CREATE_THREAD_DEBUG_EVENT => Self::CreateThread,
            CREATE_PROCESS_DEBUG_EVENT => Self::CreateProcess,
            EXIT_THREAD_DEBUG_EVENT => Self::ExitThread,
            EXIT_PROCESS_DEBUG_EVENT => Self::ExitProcess,
            LOAD_DLL_DEBUG_EVENT => Self::LoadDll,
            UNLOAD_DLL_DEBUG_EVENT => Self::UnloadDll,
            OUTPUT_DEBUG_STRING_EVENT => Self::OutputString,
            RIP_EVENT => Self::Rip,
            _ => Self::UnknownEvent,
        }
    }

    /// Handler for an exception code; `unknown_exception` when the code is not in the table.
    #[must_use]
    pub fn for_exception_code(code: u32) -> Self
    {
        match code {
            EXCEPTION_ACCESS_VIOLATION => Self::AccessViolation,
            EXCEPTION_ARRAY_BOUNDS_EXCEEDED => Self::ArrayBoundsExceeded,
            EXCEPTION_BREAKPOINT => Self::Breakpoint,
            EXCEPTION_DATATYPE_MISALIGNMENT => Self::DatatypeMisalignment,
            EXCEPTION_FLT_DENORMAL_OPERAND => Self::FloatDenormalOperand,
            EXCEPTION_FLT_DIVIDE_BY_ZERO => Self::FloatDivideByZero,
            EXCEPTION_FLT_INEXACT_RESULT => Self::FloatInexactResult,
            EXCEPTION_FLT_INVALID_OPERATION => Self::FloatInvalidOperation,
            EXCEPTION_FLT_OVERFLOW => Self::FloatOverflow,
            EXCEPTION_FLT_STACK_CHECK => Self::FloatStackCheck,
            EXCEPTION_FLT_UNDERFLOW => Self::FloatUnderflow,
            EXCEPTION_ILLEGAL_INSTRUCTION => Self::IllegalInstruction,
            EXCEPTION_IN_PAGE_ERROR => Self::InPageError,
            EXCEPTION_INT_DIVIDE_BY_ZERO => Self::IntegerDivideByZero,
            EXCEPTION_INT_OVERFLOW => Self::IntegerOverflow,
            EXCEPTION_INVALID_DISPOSITION => Self::InvalidDisposition,
            EXCEPTION_NONCONTINUABLE_EXCEPTION => Self::NoncontinuableException,
            EXCEPTION_PRIV_INSTRUCTION => Self::PrivilegedInstruction,
            EXCEPTION_SINGLE_STEP => Self::SingleStep,
            EXCEPTION_STACK_OVERFLOW => Self::StackOverflow,
            EXCEPTION_GUARD_PAGE => Self::GuardPage,
            EXCEPTION_INVALID_HANDLE => Self::InvalidHandle,
            EXCEPTION_POSSIBLE_DEADLOCK => Self::PossibleDeadlock,
            CONTROL_C_EXIT => Self::ControlCExit,
            DBG_CONTROL_C => Self::DebugControlC,
            MS_VC_EXCEPTION => Self::MsVcException,
            _ => Self::UnknownException,
        }
    }

    /// The most specific handler for `event`. Exception events are resolved
    /// by exception code, everything else by event code.
    #[must_use]
    pub fn resolve(event: &Event<'_>) -> Self
    {
        match event {
            Event::Exception(exception) => Self::for_exception_code(exception.exception_code()),
            Event::Unknown(_) => Self::UnknownEvent,
            other => Self::for_event_code(other.code()),
        }
    }
}

/// User-overridable reactions to debug events.
///
/// Every method receives the event and may change its continue status. The
/// value returned by the method that ends up handling an event is passed back
/// to the dispatcher's caller.
#[allow(unused_variables)]
pub trait EventHandler
{
    /// Value produced by each handler call.
    type Output: Default;

    /// Exported functions to hook whenever the named module loads.
    fn api_hooks(&self) -> ApiHookTable
    {
        &[]
    }

    /// A hooked function was entered. `arguments` holds the stack arguments
    /// declared for `hook`. Does nothing by default.
    fn api_hook_entry(
        &mut self,
        event: &mut Event<'_>,
        hook: &ApiHookSpec,
        return_address: Address,
        arguments: &[u64],
    ) -> VigilResult<Self::Output>
    {
        Ok(Self::Output::default())
    }

    /// A hooked function returned. Does nothing by default.
    fn api_hook_exit(&mut self, event: &mut Event<'_>, hook: &ApiHookSpec, return_value: u64) -> VigilResult<Self::Output>
    {
        Ok(Self::Output::default())
    }

    /// Catch-all. Does nothing by default.
    fn event(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        Ok(Self::Output::default())
    }

    /// Any exception without a more specific override.
    fn exception(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.event(event)
    }

    /// An event code outside the table.
    fn unknown_event(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.event(event)
    }

    fn create_thread(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.event(event)
    }

    fn create_process(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.event(event)
    }

    fn exit_thread(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.event(event)
    }

    fn exit_process(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.event(event)
    }

    /// Runs after the handler's API hooks for the module were installed.
    fn load_dll(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.event(event)
    }

    fn unload_dll(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.event(event)
    }

    fn output_string(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.event(event)
    }

    fn rip(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.event(event)
    }

    /// An exception code outside the table, typically a C++ exception.
    fn unknown_exception(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn access_violation(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn array_bounds_exceeded(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn breakpoint(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn datatype_misalignment(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn float_denormal_operand(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn float_divide_by_zero(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn float_inexact_result(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn float_invalid_operation(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn float_overflow(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn float_stack_check(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn float_underflow(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn illegal_instruction(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn in_page_error(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn integer_divide_by_zero(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn integer_overflow(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn invalid_disposition(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn noncontinuable_exception(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn privileged_instruction(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn single_step(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn stack_overflow(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn guard_page(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn invalid_handle(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn possible_deadlock(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn control_c_exit(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn debug_control_c(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }

    fn ms_vc_exception(&mut self, event: &mut Event<'_>) -> VigilResult<Self::Output>
    {
        self.exception(event)
    }
}

/// A handler that does nothing, for sessions that only need bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHandler;

impl EventHandler for NoHandler
{
    type Output = ();
}

/// Routes events to an [`EventHandler`] and keeps its API hooks installed.
#[derive(Debug)]
pub struct HandlerDispatch<H>
{
    handler: H,
    api_hooks: HashMap<String, Vec<ApiHook>>,
}

impl<H: EventHandler> HandlerDispatch<H>
{
    /// Wrap `handler`, turning its declared API hooks into active hooks.
    pub fn new(handler: H) -> Self
    {
        let api_hooks = build_api_hooks(handler.api_hooks());
        Self { handler, api_hooks }
    }

    #[must_use]
    pub fn handler(&self) -> &H
    {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H
    {
        &mut self.handler
    }

    #[must_use]
    pub fn into_inner(self) -> H
    {
        self.handler
    }

    /// Active hooks, keyed by lower-cased module name.
    #[must_use]
    pub fn api_hooks(&self) -> &HashMap<String, Vec<ApiHook>>
    {
        &self.api_hooks
    }

    /// Invoke the most specific handler for `event`.
    ///
    /// Traps that hit an API hook installed in the event's process go to the
    /// hook's entry or exit method. DLL loads install matching API hooks
    /// first. Process exits forget where hooks were installed once the handler
    /// returns, so a recycled process id gets its hooks again.
    ///
    /// # Errors
    ///
    /// Hook queries and installation failures, or whatever the handler returns.
    pub fn dispatch(&mut self, event: &mut Event<'_>) -> VigilResult<H::Output>
    {
        if let Some(hit) = self.api_hook_hit(event)? {
            if let Some(hook) = find_installed_hook(&self.api_hooks, &hit, event.pid()) {
                trace!(pid = event.pid().0, module = %hook.spec().module, symbol = %hook.spec().symbol, "api hook hit");
                return match hit.call {
                    ApiHookCall::Entry {
                        return_address,
                        arguments,
                    } => self.handler.api_hook_entry(event, hook.spec(), return_address, &arguments),
                    ApiHookCall::Exit { return_value } => self.handler.api_hook_exit(event, hook.spec(), return_value),
                };
            }
            trace!(pid = event.pid().0, symbol = %hit.symbol, "trap reported for a hook not installed here");
        }

        let name = HandlerName::resolve(event);
        trace!(code = event.code(), pid = event.pid().0, handler = name.as_str(), "dispatching to handler");

        if let Event::LoadDll(load) = event {
            self.activate_api_hooks(load)?;
        }

        let result = name.invoke(&mut self.handler, event);

        if let Event::ExitProcess(exit) = event {
            self.forget_process(exit.pid());
        }
        result
    }

    fn api_hook_hit(&self, event: &Event<'_>) -> VigilResult<Option<ApiHookHit>>
    {
        if self.api_hooks.is_empty() {
            return Ok(None);
        }
        let Event::Exception(exception) = event else {
            return Ok(None);
        };
        if !matches!(
            exception.exception_code(),
            EXCEPTION_BREAKPOINT | EXCEPTION_SINGLE_STEP | EXCEPTION_GUARD_PAGE
        ) {
            return Ok(None);
        }
        exception
            .session()
            .target()
            .api_hook_hit(exception.pid(), exception.tid(), exception.exception_address())
    }

    fn activate_api_hooks(&mut self, event: &mut LoadDllEvent<'_>) -> VigilResult<()>
    {
        if self.api_hooks.is_empty() {
            return Ok(());
        }

        let known = event.module().and_then(|module| module.filename.clone());
        let Some(path) = known.or_else(|| event.filename()) else {
            return Ok(());
        };
        let module = file_name_from_path(&path).to_lowercase();
        let Some(hooks) = self.api_hooks.get_mut(&module) else {
            return Ok(());
        };

        let pid = event.pid();
        for hook in hooks {
            hook.hook(event.session_mut(), pid)?;
        }
        Ok(())
    }

    /// Drop every hook installation record for `pid`.
    pub fn forget_process(&mut self, pid: ProcessId)
    {
        for hook in self.api_hooks.values_mut().flatten() {
            hook.forget(pid);
        }
    }
}
