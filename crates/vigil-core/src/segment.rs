//! # Segment Resolution
//!
//! Converts a `(selector, offset)` pair into a linear address the way an x86
//! CPU does in protected mode: look up the segment descriptor, check the offset
//! against the segment's limit, then add the segment base.
//!
//! ## Descriptor classes
//!
//! The 5-bit type field of a descriptor is read in this order:
//!
//! 1. **Bit 4 clear**: a system descriptor (TSS, call gate, LDT...). It does
//!    not describe addressable memory, so resolution fails.
//! 2. **Bit 3 set**: a code segment. Bit 2 is the *conforming* flag, which
//!    only affects privilege checks. Valid offsets are `[0, limit]`.
//! 3. **Bit 3 clear**: a data segment. Bit 2 is the *expand-down* flag.
//!    Normal data segments use `[0, limit]`; expand-down segments use
//!    `[limit + 1, max]` where `max` is `0xFFFF` or `0xFFFFFFFF` depending on
//!    the default-big flag.
//!
//! Bit 2 means different things for code and data, so the class is always
//! decided before bit 2 is looked at.
//!
//! ## Limit scaling
//!
//! The raw limit is 20 bits. With the granularity flag set it counts 4 KiB
//! pages and the byte limit is `(limit << 12) | 0xFFF`.
//!
//! ## Example
//!
//! ```rust
//! use vigil_core::segment::{linear_address, LdtEntry, SegmentError};
//!
//! // Read-only expand-down data segment, 4 pages, 16-bit.
//! let entry = LdtEntry::new(0, 4, 0x14).with_granularity(true);
//! assert_eq!(linear_address(&entry, 4, None, 0x6000), Ok(0x6000));
//!
//! match linear_address(&entry, 4, None, 0x10004) {
//!     Err(SegmentError::OffsetOutOfRange { low, high, .. }) => {
//!         assert_eq!((low, high), (0x5000, 0xFFFF));
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use thiserror::Error;
use tracing::trace;

use crate::error::{VigilError, VigilResult};
use crate::platform::ThreadContext;
use crate::types::ThreadId;

const TYPE_CODE_DATA: u8 = 0x10;
const TYPE_CODE: u8 = 0x08;
const TYPE_EXPAND_DOWN_OR_CONFORMING: u8 = 0x04;

const FLAGS2_LIMIT_HI: u8 = 0x0F;
const FLAGS2_SYS: u8 = 0x10;
const FLAGS2_DEFAULT_BIG: u8 = 0x40;
const FLAGS2_GRANULARITY: u8 = 0x80;

/// Raw `LDT_ENTRY` as returned by `GetThreadSelectorEntry`.
///
/// Field names follow the Win32 structure. `flags1` packs the 5-bit type,
/// the 2-bit privilege level and the present bit; `flags2` packs the high
/// nibble of the limit with the sys, reserved, default-big and granularity
/// bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LdtEntry
{
    pub limit_low: u16,
    pub base_low: u16,
    pub base_mid: u8,
    pub flags1: u8,
    pub flags2: u8,
    pub base_hi: u8,
}

impl LdtEntry
{
    /// Build a descriptor from a 32-bit base, a raw limit and a 5-bit type.
    ///
    /// The limit is truncated to its 20 encodable bits and the type to 5 bits,
    /// exactly as storing them in the packed structure would.
    #[must_use]
    pub fn new(base: u32, limit: u32, segment_type: u8) -> Self
    {
        let [b0, b1, b2, b3] = base.to_le_bytes();
        let [l0, l1, l2, _] = limit.to_le_bytes();
        Self {
            limit_low: u16::from_le_bytes([l0, l1]),
            base_low: u16::from_le_bytes([b0, b1]),
            base_mid: b2,
            flags1: segment_type & 0x1F,
            flags2: l2 & FLAGS2_LIMIT_HI,
            base_hi: b3,
        }
    }

    /// Set or clear the granularity (page-scaled limit) flag.
    #[must_use]
    pub fn with_granularity(mut self, enabled: bool) -> Self
    {
        self.set_flag2(FLAGS2_GRANULARITY, enabled);
        self
    }

    /// Set or clear the default-big (32-bit) flag.
    #[must_use]
    pub fn with_default_big(mut self, enabled: bool) -> Self
    {
        self.set_flag2(FLAGS2_DEFAULT_BIG, enabled);
        self
    }

    fn set_flag2(&mut self, flag: u8, enabled: bool)
    {
        if enabled {
            self.flags2 |= flag;
        } else {
            self.flags2 &= !flag;
        }
    }

    /// Segment base, `BaseLow | BaseMid << 16 | BaseHi << 24`.
    #[must_use]
    pub fn base(&self) -> u32
    {
        u32::from(self.base_low) | u32::from(self.base_mid) << 16 | u32::from(self.base_hi) << 24
    }

    /// The unscaled 20-bit limit.
    #[must_use]
    pub fn raw_limit(&self) -> u32
    {
        u32::from(self.limit_low) | u32::from(self.flags2 & FLAGS2_LIMIT_HI) << 16
    }

    /// The limit in bytes, after granularity scaling.
    #[must_use]
    pub fn byte_limit(&self) -> u32
    {
        if self.granularity() {
            (self.raw_limit() << 12) | 0xFFF
        } else {
            self.raw_limit()
        }
    }

    /// The 5-bit type field.
    #[must_use]
    pub fn segment_type(&self) -> u8
    {
        self.flags1 & 0x1F
    }

    /// Descriptor privilege level.
    #[must_use]
    pub fn dpl(&self) -> u8
    {
        (self.flags1 >> 5) & 0x3
    }

    #[must_use]
    pub fn present(&self) -> bool
    {
        self.flags1 & 0x80 != 0
    }

    /// The "available for system software" bit.
    #[must_use]
    pub fn sys(&self) -> bool
    {
        self.flags2 & FLAGS2_SYS != 0
    }

    #[must_use]
    pub fn default_big(&self) -> bool
    {
        self.flags2 & FLAGS2_DEFAULT_BIG != 0
    }

    #[must_use]
    pub fn granularity(&self) -> bool
    {
        self.flags2 & FLAGS2_GRANULARITY != 0
    }

    /// `true` when the descriptor does not describe a code or data segment.
    #[must_use]
    pub fn is_system(&self) -> bool
    {
        self.segment_type() & TYPE_CODE_DATA == 0
    }

    /// `true` for code segments (conforming or not).
    #[must_use]
    pub fn is_code(&self) -> bool
    {
        !self.is_system() && self.segment_type() & TYPE_CODE != 0
    }

    /// `true` only for conforming code segments.
    #[must_use]
    pub fn is_conforming(&self) -> bool
    {
        self.is_code() && self.segment_type() & TYPE_EXPAND_DOWN_OR_CONFORMING != 0
    }

    /// `true` only for expand-down data segments.
    #[must_use]
    pub fn is_expand_down(&self) -> bool
    {
        !self.is_system() && !self.is_code() && self.segment_type() & TYPE_EXPAND_DOWN_OR_CONFORMING != 0
    }

    /// Largest offset an expand-down segment can span.
    #[must_use]
    pub fn max_offset(&self) -> u32
    {
        if self.default_big() { u32::MAX } else { 0xFFFF }
    }

    /// Offsets the segment spans, or `None` for an empty expand-down segment.
    ///
    /// System descriptors have no meaningful range; callers check
    /// [`is_system`](Self::is_system) first.
    #[must_use]
    pub fn offset_range(&self) -> Option<RangeInclusive<u32>>
    {
        let limit = self.byte_limit();
        if !self.is_expand_down() {
            return Some(0..=limit);
        }

        let low = u64::from(limit) + 1;
        let max = self.max_offset();
        if low > u64::from(max) {
            return None;
        }
        u32::try_from(low).ok().map(|low| low..=max)
    }
}

/// Segment registers of an x86 thread context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentRegister
{
    Cs,
    Ds,
    Es,
    Fs,
    Gs,
    Ss,
}

impl SegmentRegister
{
    /// Short register name as used in error messages, e.g. `CS`.
    #[must_use]
    pub fn name(self) -> &'static str
    {
        match self {
            Self::Cs => "CS",
            Self::Ds => "DS",
            Self::Es => "ES",
            Self::Fs => "FS",
            Self::Gs => "GS",
            Self::Ss => "SS",
        }
    }

    /// Name of the matching field in the Win32 `CONTEXT` structure, e.g. `SegCs`.
    #[must_use]
    pub fn context_field(self) -> &'static str
    {
        match self {
            Self::Cs => "SegCs",
            Self::Ds => "SegDs",
            Self::Es => "SegEs",
            Self::Fs => "SegFs",
            Self::Gs => "SegGs",
            Self::Ss => "SegSs",
        }
    }
}

impl fmt::Display for SegmentRegister
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.name())
    }
}

impl FromStr for SegmentRegister
{
    type Err = VigilError;

    /// Accepts both `CONTEXT` field names (`SegCs`) and bare names (`cs`, `CS`).
    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let lower = s.to_ascii_lowercase();
        let bare = lower.strip_prefix("seg").unwrap_or(&lower);
        match bare {
            "cs" => Ok(Self::Cs),
            "ds" => Ok(Self::Ds),
            "es" => Ok(Self::Es),
            "fs" => Ok(Self::Fs),
            "gs" => Ok(Self::Gs),
            "ss" => Ok(Self::Ss),
            _ => Err(VigilError::InvalidArgument(format!("not a segment register: {s}"))),
        }
    }
}

/// What to resolve: a selector value, or a register holding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector
{
    Value(u16),
    Register(SegmentRegister),
}

impl From<u16> for Selector
{
    fn from(value: u16) -> Self
    {
        Self::Value(value)
    }
}

impl From<SegmentRegister> for Selector
{
    fn from(register: SegmentRegister) -> Self
    {
        Self::Register(register)
    }
}

/// Why an offset could not be turned into a linear address.
///
/// Every variant names the selector and, when the caller resolved through a
/// register, that register.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError
{
    /// The selector addresses a system descriptor.
    #[error("Selector {selector}{} identifies a system descriptor.", register_suffix(.register))]
    SystemDescriptor
    {
        selector: u16,
        register: Option<SegmentRegister>,
    },

    /// The offset lies outside `[low, high]`.
    #[error(
        "Offset {offset:08X} is invalid for the segment with selector {selector}{}. \
         The segment spans the bytes from offset {low:08X} through {high:08X}.",
        register_suffix(.register)
    )]
    OffsetOutOfRange
    {
        selector: u16,
        register: Option<SegmentRegister>,
        offset: u32,
        low: u32,
        high: u32,
    },

    /// An expand-down segment whose limit is at or above its maximum offset.
    #[error(
        "Offset {offset:08X} is invalid for the segment with selector {selector}{}. \
         The segment does not span any memory locations.",
        register_suffix(.register)
    )]
    EmptySegment
    {
        selector: u16,
        register: Option<SegmentRegister>,
        offset: u32,
    },
}

#[allow(clippy::ref_option)]
fn register_suffix(register: &Option<SegmentRegister>) -> String
{
    register.map(|r| format!(" (register {r})")).unwrap_or_default()
}

/// Resolve `offset` within the segment described by `entry`.
///
/// `selector` and `register` are only used to label errors. The linear
/// address wraps at 32 bits, as it does on the CPU.
pub fn linear_address(
    entry: &LdtEntry,
    selector: u16,
    register: Option<SegmentRegister>,
    offset: u32,
) -> Result<u32, SegmentError>
{
    if entry.is_system() {
        return Err(SegmentError::SystemDescriptor { selector, register });
    }

    let Some(range) = entry.offset_range() else {
        return Err(SegmentError::EmptySegment {
            selector,
            register,
            offset,
        });
    };

    if !range.contains(&offset) {
        return Err(SegmentError::OffsetOutOfRange {
            selector,
            register,
            offset,
            low: *range.start(),
            high: *range.end(),
        });
    }

    Ok(entry.base().wrapping_add(offset))
}

/// Resolve `offset` for thread `tid`, reading the selector and descriptor
/// from `context`.
///
/// The thread must be suspended by the caller; register and descriptor values
/// are read once and assumed stable.
pub fn resolve_linear_address(
    context: &(impl ThreadContext + ?Sized),
    tid: ThreadId,
    selector: Selector,
    offset: u32,
) -> VigilResult<u32>
{
    let (value, register) = match selector {
        Selector::Value(value) => (value, None),
        Selector::Register(register) => (context.segment_register(tid, register)?, Some(register)),
    };

    let entry = context.selector_entry(tid, value)?;
    trace!(tid = tid.0, selector = value, base = entry.base(), limit = entry.byte_limit(), "resolving linear address");

    Ok(linear_address(&entry, value, register, offset)?)
}

#[cfg(test)]
mod tests
{
    use super::*;

    const CODE_EXECUTE_ONLY: u8 = 0x10 | 8;
    const CODE_CONFORMING: u8 = 0x10 | 12;
    const DATA_READ_WRITE: u8 = 0x10 | 2;
    const DATA_EXPAND_DOWN: u8 = 0x10 | 4;

    #[test]
    fn base_is_assembled_from_three_fields()
    {
        let entry = LdtEntry::new(0x1234_5678, 0, DATA_READ_WRITE);
        assert_eq!(entry.base_low, 0x5678);
        assert_eq!(entry.base_mid, 0x34);
        assert_eq!(entry.base_hi, 0x12);
        assert_eq!(entry.base(), 0x1234_5678);
    }

    #[test]
    fn limit_is_truncated_to_twenty_bits()
    {
        let entry = LdtEntry::new(0, 0x9007_F530, DATA_EXPAND_DOWN);
        assert_eq!(entry.raw_limit(), 0x7_F530);
    }

    #[test]
    fn granular_limit_is_page_scaled()
    {
        let entry = LdtEntry::new(0, 9, DATA_READ_WRITE).with_granularity(true);
        assert_eq!(entry.byte_limit(), 0x9FFF);
    }

    #[test]
    fn conforming_code_is_not_expand_down()
    {
        let entry = LdtEntry::new(0, 0xE4, CODE_CONFORMING);
        assert!(entry.is_code());
        assert!(entry.is_conforming());
        assert!(!entry.is_expand_down());
        assert_eq!(entry.offset_range(), Some(0..=0xE4));
    }

    #[test]
    fn type_zero_is_system()
    {
        let entry = LdtEntry::new(0, 0xFFFF, 0);
        assert!(entry.is_system());
        assert!(!entry.is_code());
        assert!(!entry.is_expand_down());
    }

    #[test]
    fn expand_down_range_depends_on_default_big()
    {
        let small = LdtEntry::new(0, 0x2FF, DATA_EXPAND_DOWN);
        assert_eq!(small.offset_range(), Some(0x300..=0xFFFF));

        let big = small.with_default_big(true);
        assert_eq!(big.offset_range(), Some(0x300..=u32::MAX));
    }

    #[test]
    fn full_expand_down_segment_is_empty()
    {
        let entry = LdtEntry::new(0, 0xF_FFFF, DATA_EXPAND_DOWN)
            .with_granularity(true)
            .with_default_big(true);
        assert_eq!(entry.byte_limit(), u32::MAX);
        assert_eq!(entry.offset_range(), None);
    }

    #[test]
    fn linear_address_wraps_at_four_gigabytes()
    {
        let entry = LdtEntry::new(0xFFFF_F000, 0xF_FFFF, CODE_EXECUTE_ONLY).with_granularity(true);
        assert_eq!(linear_address(&entry, 8, None, 0x2000), Ok(0x1000));
    }

    #[test]
    fn register_names_parse_in_both_spellings()
    {
        assert_eq!("SegCs".parse::<SegmentRegister>().ok(), Some(SegmentRegister::Cs));
        assert_eq!("ss".parse::<SegmentRegister>().ok(), Some(SegmentRegister::Ss));
        assert_eq!("GS".parse::<SegmentRegister>().ok(), Some(SegmentRegister::Gs));
        assert!("eax".parse::<SegmentRegister>().is_err());
    }

    #[test]
    fn context_field_round_trips_through_from_str()
    {
        for register in [
            SegmentRegister::Cs,
            SegmentRegister::Ds,
            SegmentRegister::Es,
            SegmentRegister::Fs,
            SegmentRegister::Gs,
            SegmentRegister::Ss,
        ] {
            assert_eq!(register.context_field().parse::<SegmentRegister>().ok(), Some(register));
        }
    }
}
