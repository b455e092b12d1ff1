//! # Win32 Debugging Constants
//!
//! Numeric values from the Win32 debugging API (`winbase.h`, `winnt.h`,
//! `ntstatus.h`). They are defined here rather than pulled from a bindings
//! crate because the engine itself is platform-agnostic: raw events may be
//! produced on Windows, replayed from a recording, or synthesized in tests.
//!
//! See: [DEBUG_EVENT structure](https://learn.microsoft.com/en-us/windows/win32/api/minwinbase/ns-minwinbase-debug_event)

// Debug event codes (DEBUG_EVENT.dwDebugEventCode)

/// `EXCEPTION_DEBUG_EVENT`
pub const EXCEPTION_DEBUG_EVENT: u32 = 1;
/// `CREATE_THREAD_DEBUG_EVENT`
pub const CREATE_THREAD_DEBUG_EVENT: u32 = 2;
/// `CREATE_PROCESS_DEBUG_EVENT`
pub const CREATE_PROCESS_DEBUG_EVENT: u32 = 3;
/// `EXIT_THREAD_DEBUG_EVENT`
pub const EXIT_THREAD_DEBUG_EVENT: u32 = 4;
/// `EXIT_PROCESS_DEBUG_EVENT`
pub const EXIT_PROCESS_DEBUG_EVENT: u32 = 5;
/// `LOAD_DLL_DEBUG_EVENT`
pub const LOAD_DLL_DEBUG_EVENT: u32 = 6;
/// `UNLOAD_DLL_DEBUG_EVENT`
pub const UNLOAD_DLL_DEBUG_EVENT: u32 = 7;
/// `OUTPUT_DEBUG_STRING_EVENT`
pub const OUTPUT_DEBUG_STRING_EVENT: u32 = 8;
/// `RIP_EVENT`
pub const RIP_EVENT: u32 = 9;

// Exception codes (EXCEPTION_RECORD.ExceptionCode)

pub const EXCEPTION_ACCESS_VIOLATION: u32 = 0xC000_0005;
pub const EXCEPTION_ARRAY_BOUNDS_EXCEEDED: u32 = 0xC000_008C;
pub const EXCEPTION_BREAKPOINT: u32 = 0x8000_0003;
pub const EXCEPTION_DATATYPE_MISALIGNMENT: u32 = 0x8000_0002;
pub const EXCEPTION_FLT_DENORMAL_OPERAND: u32 = 0xC000_008D;
pub const EXCEPTION_FLT_DIVIDE_BY_ZERO: u32 = 0xC000_008E;
pub const EXCEPTION_FLT_INEXACT_RESULT: u32 = 0xC000_008F;
pub const EXCEPTION_FLT_INVALID_OPERATION: u32 = 0xC000_0090;
pub const EXCEPTION_FLT_OVERFLOW: u32 = 0xC000_0091;
pub const EXCEPTION_FLT_STACK_CHECK: u32 = 0xC000_0092;
pub const EXCEPTION_FLT_UNDERFLOW: u32 = 0xC000_0093;
pub const EXCEPTION_ILLEGAL_INSTRUCTION: u32 = 0xC000_001D;
pub const EXCEPTION_IN_PAGE_ERROR: u32 = 0xC000_0006;
pub const EXCEPTION_INT_DIVIDE_BY_ZERO: u32 = 0xC000_0094;
pub const EXCEPTION_INT_OVERFLOW: u32 = 0xC000_0095;
pub const EXCEPTION_INVALID_DISPOSITION: u32 = 0xC000_0026;
pub const EXCEPTION_NONCONTINUABLE_EXCEPTION: u32 = 0xC000_0025;
pub const EXCEPTION_PRIV_INSTRUCTION: u32 = 0xC000_0096;
pub const EXCEPTION_SINGLE_STEP: u32 = 0x8000_0004;
pub const EXCEPTION_STACK_OVERFLOW: u32 = 0xC000_00FD;
pub const EXCEPTION_GUARD_PAGE: u32 = 0x8000_0001;
pub const EXCEPTION_INVALID_HANDLE: u32 = 0xC000_0008;
pub const EXCEPTION_POSSIBLE_DEADLOCK: u32 = 0xC000_0194;
pub const CONTROL_C_EXIT: u32 = 0xC000_013A;
pub const DBG_CONTROL_C: u32 = 0x4001_0005;
/// Raised by MSVC-compiled code, most notably to name threads.
pub const MS_VC_EXCEPTION: u32 = 0x406D_1388;

// Continue status (ContinueDebugEvent dwContinueStatus)

/// `DBG_CONTINUE`
pub const DBG_CONTINUE: u32 = 0x0001_0002;
/// `DBG_EXCEPTION_HANDLED`
pub const DBG_EXCEPTION_HANDLED: u32 = 0x0001_0001;
/// `DBG_EXCEPTION_NOT_HANDLED`
pub const DBG_EXCEPTION_NOT_HANDLED: u32 = 0x8001_0001;

// Exception record details

/// `EXCEPTION_NONCONTINUABLE` bit of `ExceptionFlags`.
pub const EXCEPTION_NONCONTINUABLE: u32 = 0x1;
/// Number of `ExceptionInformation` slots in an exception record.
pub const EXCEPTION_MAXIMUM_PARAMETERS: usize = 15;

/// Access-violation `ExceptionInformation[0]` values.
pub const EXCEPTION_READ_FAULT: u64 = 0;
pub const EXCEPTION_WRITE_FAULT: u64 = 1;
pub const EXCEPTION_EXECUTE_FAULT: u64 = 8;

/// `THREADNAME_INFO.dwType` for the MSVC thread-naming convention.
pub const MS_VC_THREAD_NAME_INFO: u64 = 0x1000;

/// Longest image name read from target memory, in characters.
pub const MAX_IMAGE_NAME_CHARS: usize = 0x1000;
