//! Tests for error handling

use vigil_core::error::{VigilError, VigilResult};
use vigil_core::segment::{SegmentError, SegmentRegister};
use vigil_core::types::Address;

#[test]
fn test_index_out_of_range_display()
{
    let error = VigilError::IndexOutOfRange { index: 15, len: 15 };
    let message = format!("{}", error);
    assert!(message.contains("15"));
    assert!(message.contains("out of range"));
}

#[test]
fn test_wrong_exception_kind_display()
{
    let error = VigilError::WrongExceptionKind {
        expected: "EXCEPTION_ACCESS_VIOLATION",
        actual: "EXCEPTION_BREAKPOINT".to_string(),
    };
    let message = format!("{}", error);
    assert_eq!(message, "Expected EXCEPTION_ACCESS_VIOLATION, got EXCEPTION_BREAKPOINT");
}

#[test]
fn test_memory_read_display()
{
    let error = VigilError::MemoryRead {
        address: Address::from(0x7ffe_0000),
        size: 8,
        details: "unmapped".to_string(),
    };
    let message = format!("{}", error);
    assert!(message.contains("8 bytes"));
    assert!(message.contains("unmapped"));
}

#[test]
fn test_hook_install_display()
{
    let error = VigilError::HookInstall {
        module: "kernel32.dll".to_string(),
        symbol: "CreateFileW".to_string(),
        details: "export not found".to_string(),
    };
    let message = format!("{}", error);
    assert!(message.contains("kernel32.dll!CreateFileW"));
}

#[test]
fn test_handler_error_display()
{
    let error = VigilError::Handler("breakpoint table corrupted".to_string());
    let message = format!("{}", error);
    assert!(message.contains("Handler failed"));
    assert!(message.contains("breakpoint table corrupted"));
}

#[test]
fn test_segment_error_is_transparent()
{
    let segment = SegmentError::SystemDescriptor {
        selector: 50,
        register: Some(SegmentRegister::Cs),
    };
    let error: VigilError = segment.clone().into();

    assert_eq!(error.to_string(), segment.to_string());
    match error {
        VigilError::Segment(inner) => assert_eq!(inner, segment),
        _ => panic!("Expected Segment variant"),
    }
}

#[test]
fn test_io_error_conversion()
{
    use std::io::{Error, ErrorKind};

    let io_error = Error::new(ErrorKind::NotFound, "file not found");
    let error: VigilError = io_error.into();

    match error {
        VigilError::Io(_) => {}
        _ => panic!("Expected Io variant"),
    }
}

#[test]
fn test_result_type()
{
    fn returns_result() -> VigilResult<u32>
    {
        Ok(42)
    }

    fn returns_error() -> VigilResult<u32>
    {
        Err(VigilError::InvalidArgument("test".to_string()))
    }

    assert_eq!(returns_result().unwrap(), 42);
    assert!(returns_error().is_err());
}
