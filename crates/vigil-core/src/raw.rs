//! # Raw Debug Events
//!
//! [`RawEvent`] is the engine's ingestion type: one value per notification
//! returned by the OS wait call. It mirrors the Win32 `DEBUG_EVENT` layout
//! with the C union replaced by [`DebugInfo`], so the payload can never
//! disagree with the event code. A payload for a code outside the table wraps
//! an [`UnknownCode`], which refuses the nine codes that have a layout.
//!
//! A platform backend builds `RawEvent`s from `WaitForDebugEvent` output; tests
//! and replay tools build them directly.

use smallvec::SmallVec;

use crate::constants::{
    CREATE_PROCESS_DEBUG_EVENT, CREATE_THREAD_DEBUG_EVENT, EXCEPTION_DEBUG_EVENT, EXCEPTION_MAXIMUM_PARAMETERS,
    EXCEPTION_NONCONTINUABLE, EXIT_PROCESS_DEBUG_EVENT, EXIT_THREAD_DEBUG_EVENT, LOAD_DLL_DEBUG_EVENT,
    OUTPUT_DEBUG_STRING_EVENT, RIP_EVENT, UNLOAD_DLL_DEBUG_EVENT,
};
use crate::error::{VigilError, VigilResult};
use crate::event::DebugEventKind;
use crate::types::{Address, ProcessId, RawHandle, ThreadId};

/// `EXCEPTION_RECORD`
///
/// Nested records describe an exception raised while a previous one was being
/// handled; `nested` points at the older one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRecord
{
    /// Exception code, e.g. `EXCEPTION_ACCESS_VIOLATION`.
    pub code: u32,
    /// `ExceptionFlags`; see `EXCEPTION_NONCONTINUABLE`.
    pub flags: u32,
    /// Address where the exception occurred.
    pub address: Address,
    /// Number of meaningful entries in `information`.
    pub number_parameters: u32,
    /// `ExceptionInformation` slots.
    pub information: [u64; EXCEPTION_MAXIMUM_PARAMETERS],
    /// The exception being handled when this one was raised.
    pub nested: Option<Box<ExceptionRecord>>,
}

impl ExceptionRecord
{
    /// Record with the given code and address and no parameters.
    #[must_use]
    pub fn new(code: u32, address: Address) -> Self
    {
        Self {
            code,
            flags: 0,
            address,
            number_parameters: 0,
            information: [0; EXCEPTION_MAXIMUM_PARAMETERS],
            nested: None,
        }
    }

    /// Set the leading information slots. Extra values beyond the slot count are ignored.
    #[must_use]
    pub fn with_information(mut self, values: &[u64]) -> Self
    {
        let count = values.len().min(EXCEPTION_MAXIMUM_PARAMETERS);
        self.information[..count].copy_from_slice(&values[..count]);
        self.number_parameters = u32::try_from(count).unwrap_or(u32::MAX);
        self
    }

    /// Mark the record noncontinuable.
    #[must_use]
    pub fn noncontinuable(mut self) -> Self
    {
        self.flags |= EXCEPTION_NONCONTINUABLE;
        self
    }

    /// Chain an older record behind this one.
    #[must_use]
    pub fn with_nested(mut self, nested: ExceptionRecord) -> Self
    {
        self.nested = Some(Box::new(nested));
        self
    }

    /// This record followed by every nested record, most recent first.
    #[must_use]
    pub fn chain(&self) -> SmallVec<[&ExceptionRecord; 2]>
    {
        let mut records = SmallVec::new();
        let mut current = Some(self);
        while let Some(record) = current {
            records.push(record);
            current = record.nested.as_deref();
        }
        records
    }
}

/// `EXCEPTION_DEBUG_INFO`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionDebugInfo
{
    /// The most recent exception record.
    pub record: ExceptionRecord,
    /// `dwFirstChance != 0`
    pub first_chance: bool,
}

/// `CREATE_THREAD_DEBUG_INFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateThreadDebugInfo
{
    pub thread_handle: RawHandle,
    pub thread_local_base: Address,
    pub start_address: Address,
}

/// `CREATE_PROCESS_DEBUG_INFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateProcessDebugInfo
{
    pub file_handle: RawHandle,
    pub process_handle: RawHandle,
    pub thread_handle: RawHandle,
    pub base_of_image: Address,
    pub debug_info_file_offset: u32,
    pub debug_info_size: u32,
    pub thread_local_base: Address,
    pub start_address: Address,
    /// Pointer in the target to a pointer to the image name. Usually null.
    pub image_name: Address,
    pub unicode: bool,
}

/// `EXIT_THREAD_DEBUG_INFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitThreadDebugInfo
{
    pub exit_code: u32,
}

/// `EXIT_PROCESS_DEBUG_INFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitProcessDebugInfo
{
    pub exit_code: u32,
}

/// `LOAD_DLL_DEBUG_INFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadDllDebugInfo
{
    pub file_handle: RawHandle,
    pub base_of_dll: Address,
    pub debug_info_file_offset: u32,
    pub debug_info_size: u32,
    /// Pointer in the target to a pointer to the image name. Usually null.
    pub image_name: Address,
    pub unicode: bool,
}

/// `UNLOAD_DLL_DEBUG_INFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnloadDllDebugInfo
{
    pub base_of_dll: Address,
}

/// `OUTPUT_DEBUG_STRING_INFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputDebugStringInfo
{
    pub data: Address,
    pub unicode: bool,
    /// Length in characters, including the terminator.
    pub length: u16,
}

/// `RIP_INFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RipInfo
{
    pub error: u32,
    pub kind: u32,
}

/// An event code with no payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnknownCode(u32);

impl UnknownCode
{
    /// Wrap `code`.
    ///
    /// # Errors
    ///
    /// [`VigilError::InvalidArgument`] if `code` is one of the documented
    /// event codes; those must be delivered with their own payload.
    pub fn new(code: u32) -> VigilResult<Self>
    {
        match DebugEventKind::from_code(code) {
            Some(kind) => Err(VigilError::InvalidArgument(format!(
                "event code {code} ({}) needs its own payload",
                kind.event_name()
            ))),
            None => Ok(Self(code)),
        }
    }

    #[must_use]
    pub fn get(self) -> u32
    {
        self.0
    }
}

impl TryFrom<u32> for UnknownCode
{
    type Error = VigilError;

    fn try_from(code: u32) -> VigilResult<Self>
    {
        Self::new(code)
    }
}

/// Event-specific payload of a [`RawEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugInfo
{
    Exception(ExceptionDebugInfo),
    CreateThread(CreateThreadDebugInfo),
    CreateProcess(CreateProcessDebugInfo),
    ExitThread(ExitThreadDebugInfo),
    ExitProcess(ExitProcessDebugInfo),
    LoadDll(LoadDllDebugInfo),
    UnloadDll(UnloadDllDebugInfo),
    OutputDebugString(OutputDebugStringInfo),
    Rip(RipInfo),
    /// An event code the engine has no payload layout for.
    Unknown(UnknownCode),
}

impl DebugInfo
{
    /// Payload for an event code outside the table.
    ///
    /// # Errors
    ///
    /// See [`UnknownCode::new`].
    pub fn unknown(code: u32) -> VigilResult<Self>
    {
        UnknownCode::new(code).map(Self::Unknown)
    }

    /// The `dwDebugEventCode` this payload belongs to.
    #[must_use]
    pub fn code(&self) -> u32
    {
        match self {
            Self::Exception(_) => EXCEPTION_DEBUG_EVENT,
            Self::CreateThread(_) => CREATE_THREAD_DEBUG_EVENT,
            Self::CreateProcess(_) => CREATE_PROCESS_DEBUG_EVENT,
            Self::ExitThread(_) => EXIT_THREAD_DEBUG_EVENT,
            Self::ExitProcess(_) => EXIT_PROCESS_DEBUG_EVENT,
            Self::LoadDll(_) => LOAD_DLL_DEBUG_EVENT,
            Self::UnloadDll(_) => UNLOAD_DLL_DEBUG_EVENT,
            Self::OutputDebugString(_) => OUTPUT_DEBUG_STRING_EVENT,
            Self::Rip(_) => RIP_EVENT,
            Self::Unknown(code) => code.get(),
        }
    }
}

/// One OS debug notification.
///
/// Immutable once built. The event code is derived from the payload.
///
/// ```rust
/// use vigil_core::raw::{DebugInfo, ExitThreadDebugInfo, RawEvent};
/// use vigil_core::constants::EXIT_THREAD_DEBUG_EVENT;
///
/// let raw = RawEvent::new(10, 20, DebugInfo::ExitThread(ExitThreadDebugInfo { exit_code: 0 }));
/// assert_eq!(raw.code(), EXIT_THREAD_DEBUG_EVENT);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent
{
    pid: ProcessId,
    tid: ThreadId,
    info: DebugInfo,
}

impl RawEvent
{
    /// Build a raw event.
    #[must_use]
    pub fn new(pid: impl Into<ProcessId>, tid: impl Into<ThreadId>, info: DebugInfo) -> Self
    {
        Self {
            pid: pid.into(),
            tid: tid.into(),
            info,
        }
    }

    /// `dwDebugEventCode`
    #[must_use]
    pub fn code(&self) -> u32
    {
        self.info.code()
    }

    /// `dwProcessId`
    #[must_use]
    pub fn pid(&self) -> ProcessId
    {
        self.pid
    }

    /// `dwThreadId`
    #[must_use]
    pub fn tid(&self) -> ThreadId
    {
        self.tid
    }

    /// The event-specific payload.
    #[must_use]
    pub fn info(&self) -> &DebugInfo
    {
        &self.info
    }

    pub(crate) fn into_parts(self) -> (ProcessId, ThreadId, DebugInfo)
    {
        (self.pid, self.tid, self.info)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::constants::{EXCEPTION_ACCESS_VIOLATION, EXCEPTION_BREAKPOINT};

    #[test]
    fn chain_walks_nested_records_most_recent_first()
    {
        let inner = ExceptionRecord::new(EXCEPTION_BREAKPOINT, Address::from(0x10));
        let outer = ExceptionRecord::new(EXCEPTION_ACCESS_VIOLATION, Address::from(0x20)).with_nested(inner);

        let codes: Vec<u32> = outer.chain().iter().map(|r| r.code).collect();
        assert_eq!(codes, vec![EXCEPTION_ACCESS_VIOLATION, EXCEPTION_BREAKPOINT]);
    }

    #[test]
    fn with_information_truncates_to_slot_count()
    {
        let values = [7u64; 20];
        let record = ExceptionRecord::new(0, Address::ZERO).with_information(&values);
        assert_eq!(record.number_parameters as usize, EXCEPTION_MAXIMUM_PARAMETERS);
        assert!(record.information.iter().all(|v| *v == 7));
    }

    #[test]
    fn unknown_payload_keeps_its_code()
    {
        let raw = RawEvent::new(1, 2, DebugInfo::unknown(0x42).unwrap());
        assert_eq!(raw.code(), 0x42);
    }

    #[test]
    fn unknown_payload_refuses_documented_codes()
    {
        for kind in DebugEventKind::ALL {
            assert!(
                matches!(UnknownCode::new(kind.code()), Err(VigilError::InvalidArgument(_))),
                "{} accepted",
                kind.event_name()
            );
        }
        assert!(DebugInfo::unknown(EXIT_PROCESS_DEBUG_EVENT).is_err());
        assert_eq!(UnknownCode::try_from(0).map(UnknownCode::get).ok(), Some(0));
        assert_eq!(UnknownCode::new(10).map(UnknownCode::get).ok(), Some(10));
    }
}
