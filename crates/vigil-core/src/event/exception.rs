use std::borrow::Cow;
use std::ops::{Deref, DerefMut};

use smallvec::SmallVec;

use super::{EventBase, ExceptionKind};
use crate::constants::{
    EXCEPTION_ACCESS_VIOLATION, EXCEPTION_EXECUTE_FAULT, EXCEPTION_MAXIMUM_PARAMETERS, EXCEPTION_NONCONTINUABLE,
    EXCEPTION_READ_FAULT, EXCEPTION_WRITE_FAULT, MS_VC_EXCEPTION, MS_VC_THREAD_NAME_INFO,
};
use crate::error::{VigilError, VigilResult};
use crate::raw::{ExceptionDebugInfo, ExceptionRecord};
use crate::types::{Address, ThreadId};

/// What kind of access caused an access violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessViolationType
{
    Read,
    Write,
    /// Data execution prevention fault.
    Execute,
    /// Any other value in `ExceptionInformation[0]`.
    Other(u64),
}

impl From<u64> for AccessViolationType
{
    fn from(value: u64) -> Self
    {
        match value {
            EXCEPTION_READ_FAULT => Self::Read,
            EXCEPTION_WRITE_FAULT => Self::Write,
            EXCEPTION_EXECUTE_FAULT => Self::Execute,
            other => Self::Other(other),
        }
    }
}

/// Payload of an MSVC `THREADNAME_INFO` exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadNameInfo
{
    /// Address of the ANSI thread name in the target.
    pub name: Address,
    /// Thread being named; `None` means the raising thread.
    pub thread: Option<ThreadId>,
}

/// An exception raised in the target (`EXCEPTION_DEBUG_EVENT`).
///
/// All accessors read the most recent exception record; older ones are
/// available through [`nested_exception_records`](Self::nested_exception_records).
#[derive(Debug)]
pub struct ExceptionEvent<'a>
{
    pub(crate) base: EventBase<'a>,
    info: ExceptionDebugInfo,
}

impl<'a> ExceptionEvent<'a>
{
    pub(crate) fn new(base: EventBase<'a>, info: ExceptionDebugInfo) -> Self
    {
        Self { base, info }
    }

    #[must_use]
    pub fn exception_code(&self) -> u32
    {
        self.info.record.code
    }

    /// The exception's table entry, or `None` for codes such as C++ exceptions.
    #[must_use]
    pub fn exception_kind(&self) -> Option<ExceptionKind>
    {
        ExceptionKind::from_code(self.exception_code())
    }

    /// Win32 constant name, or the code as `0x%08x` when it is not in the table.
    #[must_use]
    pub fn exception_name(&self) -> Cow<'static, str>
    {
        match self.exception_kind() {
            Some(kind) => Cow::Borrowed(kind.name()),
            None => Cow::Owned(format!("0x{:08x}", self.exception_code())),
        }
    }

    /// User-friendly description. Unknown codes are reported as C++ exceptions,
    /// the most common source of them.
    #[must_use]
    pub fn exception_description(&self) -> Cow<'static, str>
    {
        match self.exception_kind() {
            Some(kind) => Cow::Borrowed(kind.description()),
            None => Cow::Owned(format!("C++ exception 0x{:08x}", self.exception_code())),
        }
    }

    #[must_use]
    pub fn is_first_chance(&self) -> bool
    {
        self.info.first_chance
    }

    #[must_use]
    pub fn is_last_chance(&self) -> bool
    {
        !self.is_first_chance()
    }

    /// Continuing a noncontinuable exception raises
    /// `EXCEPTION_NONCONTINUABLE_EXCEPTION` in the target.
    #[must_use]
    pub fn is_noncontinuable(&self) -> bool
    {
        self.info.record.flags & EXCEPTION_NONCONTINUABLE != 0
    }

    #[must_use]
    pub fn is_continuable(&self) -> bool
    {
        !self.is_noncontinuable()
    }

    #[must_use]
    pub fn exception_address(&self) -> Address
    {
        self.info.record.address
    }

    /// One `ExceptionInformation` slot.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` unless `index < EXCEPTION_MAXIMUM_PARAMETERS`.
    pub fn exception_information(&self, index: usize) -> VigilResult<u64>
    {
        self.info.record.information.get(index).copied().ok_or(VigilError::IndexOutOfRange {
            index,
            len: EXCEPTION_MAXIMUM_PARAMETERS,
        })
    }

    /// All `ExceptionInformation` slots, including unused ones.
    #[must_use]
    pub fn exception_information_list(&self) -> &[u64]
    {
        &self.info.record.information
    }

    /// Number of slots the OS filled in.
    #[must_use]
    pub fn number_parameters(&self) -> u32
    {
        self.info.record.number_parameters
    }

    /// Whether the faulting access was a read, write or execute.
    ///
    /// # Errors
    ///
    /// `WrongExceptionKind` unless this is an access violation.
    pub fn access_violation_type(&self) -> VigilResult<AccessViolationType>
    {
        if self.exception_code() != EXCEPTION_ACCESS_VIOLATION {
            return Err(VigilError::WrongExceptionKind {
                expected: "EXCEPTION_ACCESS_VIOLATION",
                actual: self.exception_name().into_owned(),
            });
        }
        Ok(AccessViolationType::from(self.info.record.information[0]))
    }

    /// The thread-naming request carried by an `MS_VC_EXCEPTION`, if this is one.
    #[must_use]
    pub fn thread_name_info(&self) -> Option<ThreadNameInfo>
    {
        let info = &self.info.record.information;
        if self.exception_code() != MS_VC_EXCEPTION || info[0] != MS_VC_THREAD_NAME_INFO {
            return None;
        }

        // dwThreadID is a DWORD; -1 names the calling thread.
        let thread = u32::try_from(info[2] & 0xFFFF_FFFF).ok().filter(|tid| *tid != u32::MAX).map(ThreadId);
        Some(ThreadNameInfo {
            name: Address::from(info[1]),
            thread,
        })
    }

    /// The most recent record.
    #[must_use]
    pub fn record(&self) -> &ExceptionRecord
    {
        &self.info.record
    }

    /// Every record in the chain, most recent first. Never empty.
    #[must_use]
    pub fn nested_exception_records(&self) -> SmallVec<[&ExceptionRecord; 2]>
    {
        self.info.record.chain()
    }
}

impl<'a> Deref for ExceptionEvent<'a>
{
    type Target = EventBase<'a>;

    fn deref(&self) -> &Self::Target
    {
        &self.base
    }
}

impl DerefMut for ExceptionEvent<'_>
{
    fn deref_mut(&mut self) -> &mut Self::Target
    {
        &mut self.base
    }
}
