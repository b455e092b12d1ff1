//! Event and exception code tables.
//!
//! Both tables are closed `match`es over the Win32 constants. Codes outside a
//! table are not errors: they map to `None` and callers fall back to a
//! generic name.

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

/// The nine debug event codes the OS delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugEventKind
{
    Exception,
    CreateThread,
    CreateProcess,
    ExitThread,
    ExitProcess,
    LoadDll,
    UnloadDll,
    OutputDebugString,
    Rip,
}

impl DebugEventKind
{
    /// Every kind, in event-code order.
    pub const ALL: [Self; 9] = [
        Self::Exception,
        Self::CreateThread,
        Self::CreateProcess,
        Self::ExitThread,
        Self::ExitProcess,
        Self::LoadDll,
        Self::UnloadDll,
        Self::OutputDebugString,
        Self::Rip,
    ];

    #[must_use]
    pub fn from_code(code: u32) -> Option<Self>
    {
        match code {
            EXCEPTION_DEBUG_EVENT => Some(Self::Exception),
            CREATE_THREAD_DEBUG_EVENT => Some(Self::CreateThread),
            CREATE_PROCESS_DEBUG_EVENT => Some(Self::CreateProcess),
            EXIT_THREAD_DEBUG_EVENT => Some(Self::ExitThread),
            EXIT_PROCESS_DEBUG_EVENT => Some(Self::ExitProcess),
            LOAD_DLL_DEBUG_EVENT => Some(Self::LoadDll),
            UNLOAD_DLL_DEBUG_EVENT => Some(Self::UnloadDll),
            OUTPUT_DEBUG_STRING_EVENT => Some(Self::OutputDebugString),
            RIP_EVENT => Some(Self::Rip),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> u32
    {
        match self {
            Self::Exception => EXCEPTION_DEBUG_EVENT,
            Self::CreateThread => CREATE_THREAD_DEBUG_EVENT,
            Self::CreateProcess => CREATE_PROCESS_DEBUG_EVENT,
            Self::ExitThread => EXIT_THREAD_DEBUG_EVENT,
            Self::ExitProcess => EXIT_PROCESS_DEBUG_EVENT,
            Self::LoadDll => LOAD_DLL_DEBUG_EVENT,
            Self::UnloadDll => UNLOAD_DLL_DEBUG_EVENT,
            Self::OutputDebugString => OUTPUT_DEBUG_STRING_EVENT,
            Self::Rip => RIP_EVENT,
        }
    }

    /// User-friendly name, e.g. "Module load event".
    #[must_use]
    pub fn event_name(self) -> &'static str
    {
        match self {
            Self::Exception => "Exception event",
            Self::CreateThread => "Thread creation event",
            Self::CreateProcess => "Process creation event",
            Self::ExitThread => "Thread termination event",
            Self::ExitProcess => "Process termination event",
            Self::LoadDll => "Module load event",
            Self::UnloadDll => "Module unload event",
            Self::OutputDebugString => "Debug string output event",
            Self::Rip => "RIP event",
        }
    }
}

/// Name reported for event codes outside the table.
pub const UNKNOWN_EVENT_NAME: &str = "Unknown event";

macro_rules! exception_kinds {
    ($($variant:ident => $code:ident, $description:literal;)+) => {
        /// Exception codes with a well-known name and description.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ExceptionKind
        {
            $($variant,)+
        }

        impl ExceptionKind
        {
            /// Every known exception, in table order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            #[must_use]
            pub fn from_code(code: u32) -> Option<Self>
            {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }

            #[must_use]
            pub fn code(self) -> u32
            {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            /// Win32 constant name, e.g. `EXCEPTION_ACCESS_VIOLATION`.
            #[must_use]
            pub fn name(self) -> &'static str
            {
                match self {
                    $(Self::$variant => stringify!($code),)+
                }
            }

            /// User-friendly description, e.g. "Access violation".
            #[must_use]
            pub fn description(self) -> &'static str
            {
                match self {
                    $(Self::$variant => $description,)+
                }
            }
        }
    };
}

exception_kinds! {
    AccessViolation => EXCEPTION_ACCESS_VIOLATION, "Access violation";
    ArrayBoundsExceeded => EXCEPTION_ARRAY_BOUNDS_EXCEEDED, "Array bounds exceeded";
    Breakpoint => EXCEPTION_BREAKPOINT, "Breakpoint event";
    DatatypeMisalignment => EXCEPTION_DATATYPE_MISALIGNMENT, "Datatype misalignment";
    FloatDenormalOperand => EXCEPTION_FLT_DENORMAL_OPERAND, "Float denormal operand";
    FloatDivideByZero => EXCEPTION_FLT_DIVIDE_BY_ZERO, "Float divide by zero";
    FloatInexactResult => EXCEPTION_FLT_INEXACT_RESULT, "Float inexact result";
    FloatInvalidOperation => EXCEPTION_FLT_INVALID_OPERATION, "Float invalid operation";
    FloatOverflow => EXCEPTION_FLT_OVERFLOW, "Float overflow";
    FloatStackCheck => EXCEPTION_FLT_STACK_CHECK, "Float stack check";
    FloatUnderflow => EXCEPTION_FLT_UNDERFLOW, "Float underflow";
    IllegalInstruction => EXCEPTION_ILLEGAL_INSTRUCTION, "Illegal instruction";
    InPageError => EXCEPTION_IN_PAGE_ERROR, "In-page error";
    IntegerDivideByZero => EXCEPTION_INT_DIVIDE_BY_ZERO, "Integer divide by zero";
    IntegerOverflow => EXCEPTION_INT_OVERFLOW, "Integer overflow";
    InvalidDisposition => EXCEPTION_INVALID_DISPOSITION, "Invalid disposition";
    NoncontinuableException => EXCEPTION_NONCONTINUABLE_EXCEPTION, "Noncontinuable exception";
    PrivilegedInstruction => EXCEPTION_PRIV_INSTRUCTION, "Privileged instruction";
    SingleStep => EXCEPTION_SINGLE_STEP, "Single step event";
    StackOverflow => EXCEPTION_STACK_OVERFLOW, "Stack limits overflow";
    GuardPage => EXCEPTION_GUARD_PAGE, "Guard page hit";
    InvalidHandle => EXCEPTION_INVALID_HANDLE, "Invalid handle";
    PossibleDeadlock => EXCEPTION_POSSIBLE_DEADLOCK, "Possible deadlock";
    ControlCExit => CONTROL_C_EXIT, "Control-C exit";
    DebugControlC => DBG_CONTROL_C, "Debug Control-C";
    MsVcException => MS_VC_EXCEPTION, "Microsoft Visual C exception";
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn event_codes_round_trip()
    {
        for kind in DebugEventKind::ALL {
            assert_eq!(DebugEventKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(DebugEventKind::from_code(0), None);
        assert_eq!(DebugEventKind::from_code(10), None);
    }

    #[test]
    fn exception_table_has_every_code()
    {
        assert_eq!(ExceptionKind::ALL.len(), 26);
        for kind in ExceptionKind::ALL {
            assert_eq!(ExceptionKind::from_code(kind.code()), Some(*kind));
        }
    }

    #[test]
    fn exception_names_are_win32_constants()
    {
        assert_eq!(ExceptionKind::AccessViolation.name(), "EXCEPTION_ACCESS_VIOLATION");
        assert_eq!(ExceptionKind::ControlCExit.name(), "CONTROL_C_EXIT");
        assert_eq!(ExceptionKind::MsVcException.name(), "MS_VC_EXCEPTION");
        assert_eq!(ExceptionKind::StackOverflow.description(), "Stack limits overflow");
    }
}
