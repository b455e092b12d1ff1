//! Tests for typed event accessors

mod common;

use vigil_core::constants::{
    EXCEPTION_ACCESS_VIOLATION, EXCEPTION_BREAKPOINT, EXCEPTION_DEBUG_EVENT, EXCEPTION_MAXIMUM_PARAMETERS,
    LOAD_DLL_DEBUG_EVENT,
};
use vigil_core::error::VigilError;
use vigil_core::event::{AccessViolationType, ContinueStatus, Event, EventFactory};
use vigil_core::raw::{DebugInfo, ExceptionRecord, RawEvent};
use vigil_core::types::{Address, ProcessId, ThreadId};

const IMAGE_BASE: u64 = 0x0040_0000;

#[test]
fn test_event_names()
{
    let (mut session, _state) = common::session();
    let cases = [
        (common::exception(1, 2, EXCEPTION_BREAKPOINT, 0, true, &[]), "Exception event"),
        (common::create_thread(1, 2, 0, 0), "Thread creation event"),
        (common::create_process(1, 2, IMAGE_BASE, 0), "Process creation event"),
        (common::exit_thread(1, 2, 0), "Thread termination event"),
        (common::exit_process(1, 2, 0), "Process termination event"),
        (common::load_dll(1, 2, 0x1000_0000, 0), "Module load event"),
        (common::unload_dll(1, 2, 0x1000_0000), "Module unload event"),
        (common::output_string(1, 2, 0, false, 0), "Debug string output event"),
        (common::rip(1, 2, 0, 0), "RIP event"),
        (RawEvent::new(1, 2, DebugInfo::unknown(99).unwrap()), "Unknown event"),
    ];

    for (raw, name) in cases {
        let code = raw.code();
        let event = EventFactory::get(&mut session, raw);
        assert_eq!(event.event_name(), name);
        assert_eq!(event.code(), code);
        assert_eq!(event.continue_status(), ContinueStatus::ExceptionNotHandled);
    }
}

#[test]
fn test_unknown_code_builds_unknown_variant()
{
    let (mut session, _state) = common::session();

    let event = EventFactory::get(&mut session, RawEvent::new(1, 2, DebugInfo::unknown(0x1234).unwrap()));

    assert!(matches!(event, Event::Unknown(_)));
    assert_eq!(event.code(), 0x1234);
    assert_eq!(event.base().kind(), None);
}

#[test]
fn test_process_and_thread_are_created_on_demand()
{
    let (mut session, _state) = common::session();
    {
        let mut event = EventFactory::get(&mut session, common::exit_thread(10, 11, 0));
        assert_eq!(event.process().pid, ProcessId(10));
        assert_eq!(event.thread().tid, ThreadId(11));
        event.thread().name = Some("main".to_string());
    }

    let thread = session.system().process(ProcessId(10)).and_then(|p| p.thread(ThreadId(11))).unwrap();
    assert_eq!(thread.name.as_deref(), Some("main"));
}

#[test]
fn test_continue_status_is_mutable()
{
    let (mut session, _state) = common::session();
    let mut event = EventFactory::get(&mut session, common::exception(1, 2, EXCEPTION_BREAKPOINT, 0, true, &[]));

    event.set_continue_status(ContinueStatus::Continue);

    assert_eq!(event.continue_status(), ContinueStatus::Continue);
    assert_eq!(event.continue_status().as_raw(), 0x0001_0002);
}

#[test]
fn test_exception_accessors()
{
    let (mut session, _state) = common::session();
    let event = EventFactory::get(
        &mut session,
        common::exception(1, 2, EXCEPTION_ACCESS_VIOLATION, 0x7FF6_1234, false, &[1, 0xDEAD_BEEF]),
    );
    let exception = event.as_exception().unwrap();

    assert_eq!(event.code(), EXCEPTION_DEBUG_EVENT);
    assert_eq!(exception.exception_code(), EXCEPTION_ACCESS_VIOLATION);
    assert_eq!(exception.exception_name(), "EXCEPTION_ACCESS_VIOLATION");
    assert_eq!(exception.exception_description(), "Access violation");
    assert!(exception.is_last_chance());
    assert!(!exception.is_first_chance());
    assert!(exception.is_continuable());
    assert_eq!(exception.exception_address(), Address::from(0x7FF6_1234));
    assert_eq!(exception.number_parameters(), 2);
    assert_eq!(exception.exception_information(1).unwrap(), 0xDEAD_BEEF);
    assert_eq!(exception.exception_information_list().len(), EXCEPTION_MAXIMUM_PARAMETERS);
    assert_eq!(exception.access_violation_type().unwrap(), AccessViolationType::Write);
}

#[test]
fn test_unknown_exception_is_described_as_cpp()
{
    let (mut session, _state) = common::session();
    let event = EventFactory::get(&mut session, common::exception(1, 2, 0xE06D_7363, 0, true, &[]));
    let exception = event.as_exception().unwrap();

    assert_eq!(exception.exception_kind(), None);
    assert_eq!(exception.exception_name(), "0xe06d7363");
    assert_eq!(exception.exception_description(), "C++ exception 0xe06d7363");
}

#[test]
fn test_exception_information_index_is_bounded()
{
    let (mut session, _state) = common::session();
    let event = EventFactory::get(&mut session, common::exception(1, 2, EXCEPTION_BREAKPOINT, 0, true, &[]));
    let exception = event.as_exception().unwrap();

    assert_eq!(exception.exception_information(14).unwrap(), 0);
    match exception.exception_information(15) {
        Err(VigilError::IndexOutOfRange { index, len }) => assert_eq!((index, len), (15, 15)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_access_violation_type_requires_access_violation()
{
    let (mut session, _state) = common::session();
    let event = EventFactory::get(&mut session, common::exception(1, 2, EXCEPTION_BREAKPOINT, 0, true, &[1]));

    let err = event.as_exception().unwrap().access_violation_type().unwrap_err();

    assert!(matches!(err, VigilError::WrongExceptionKind { ref actual, .. } if actual == "EXCEPTION_BREAKPOINT"));
}

#[test]
fn test_access_violation_types()
{
    let (mut session, _state) = common::session();
    for (value, expected) in [
        (0, AccessViolationType::Read),
        (1, AccessViolationType::Write),
        (8, AccessViolationType::Execute),
        (3, AccessViolationType::Other(3)),
    ] {
        let event =
            EventFactory::get(&mut session, common::exception(1, 2, EXCEPTION_ACCESS_VIOLATION, 0, true, &[value, 0]));
        assert_eq!(event.as_exception().unwrap().access_violation_type().unwrap(), expected);
    }
}

#[test]
fn test_noncontinuable_and_nested_records()
{
    let (mut session, _state) = common::session();
    let inner = ExceptionRecord::new(EXCEPTION_BREAKPOINT, Address::from(0x10));
    let outer = ExceptionRecord::new(EXCEPTION_ACCESS_VIOLATION, Address::from(0x20))
        .noncontinuable()
        .with_nested(inner);

    let event = EventFactory::get(&mut session, common::exception_record(1, 2, outer, true));
    let exception = event.as_exception().unwrap();

    assert!(exception.is_noncontinuable());
    assert!(!exception.is_continuable());
    let codes: Vec<u32> = exception.nested_exception_records().iter().map(|r| r.code).collect();
    assert_eq!(codes, vec![EXCEPTION_ACCESS_VIOLATION, EXCEPTION_BREAKPOINT]);
}

#[test]
fn test_non_exception_events_have_no_exception_view()
{
    let (mut session, _state) = common::session();
    let mut event = EventFactory::get(&mut session, common::exit_thread(1, 2, 0));

    assert!(event.as_exception().is_none());
    assert_eq!(event.exception_code(), None);
    assert_eq!(event.filename(), None);
}

#[test]
fn test_process_filename_from_file_handle()
{
    let (mut session, state) = common::session();
    state.borrow_mut().file_names.insert(0x44, "C:\\app\\app.exe".to_string());

    let mut event = EventFactory::get(&mut session, common::create_process(1, 2, IMAGE_BASE, 0x44));

    assert_eq!(event.filename().as_deref(), Some("C:\\app\\app.exe"));
}

#[test]
fn test_process_filename_falls_back_to_image_name_pointer()
{
    let (mut session, state) = common::session();
    {
        let mut state = state.borrow_mut();
        // Handle resolves to an empty name, which counts as a failure.
        state.file_names.insert(0x44, String::new());
        state.write_pointer(1, 0x2000, 0x3000);
        state.write_utf16(1, 0x3000, "C:\\app\\remote.exe");
    }
    let mut info = common::create_process_info(IMAGE_BASE, 0x44);
    info.image_name = Address::from(0x2000);
    info.unicode = true;

    let mut event = EventFactory::get(&mut session, RawEvent::new(1, 2, DebugInfo::CreateProcess(info)));

    assert_eq!(event.filename().as_deref(), Some("C:\\app\\remote.exe"));
}

#[test]
fn test_process_filename_falls_back_to_process_image()
{
    let (mut session, state) = common::session();
    state.borrow_mut().process_images.insert(ProcessId(1), "C:\\app\\queried.exe".to_string());
    let mut info = common::create_process_info(IMAGE_BASE, 0);
    // The pointer is unreadable.
    info.image_name = Address::from(0x2000);

    let mut event = EventFactory::get(&mut session, RawEvent::new(1, 2, DebugInfo::CreateProcess(info)));

    assert_eq!(event.filename().as_deref(), Some("C:\\app\\queried.exe"));
}

#[test]
fn test_process_filename_absent_when_every_strategy_fails()
{
    let (mut session, _state) = common::session();

    let mut event = EventFactory::get(&mut session, common::create_process(1, 2, IMAGE_BASE, 0));

    assert_eq!(event.filename(), None);
}

#[test]
fn test_dll_filename_from_ansi_pointer()
{
    let (mut session, state) = common::session();
    {
        let mut state = state.borrow_mut();
        state.write_pointer(1, 0x2000, 0x3000);
        state.write_ansi(1, 0x3000, "C:\\Windows\\System32\\ntdll.dll");
    }
    let mut info = common::load_dll_info(0x7FF8_0000_0000, 0);
    info.image_name = Address::from(0x2000);

    let mut event = EventFactory::get(&mut session, RawEvent::new(1, 2, DebugInfo::LoadDll(info)));

    assert_eq!(event.code(), LOAD_DLL_DEBUG_EVENT);
    assert_eq!(event.filename().as_deref(), Some("C:\\Windows\\System32\\ntdll.dll"));
}

#[test]
fn test_dll_filename_null_pointer_and_empty_string()
{
    let (mut session, state) = common::session();
    {
        let mut state = state.borrow_mut();
        state.write_pointer(1, 0x2000, 0);
        state.write_pointer(1, 0x2100, 0x3000);
        state.write_ansi(1, 0x3000, "");
    }

    for pointer in [0x0, 0x2000, 0x2100] {
        let mut info = common::load_dll_info(0x7FF8_0000_0000, 0);
        info.image_name = Address::from(pointer);
        let mut event = EventFactory::get(&mut session, RawEvent::new(1, 2, DebugInfo::LoadDll(info)));
        assert_eq!(event.filename(), None, "pointer {pointer:#x}");
    }
}

#[test]
fn test_file_handle_is_cached_and_closed_once()
{
    let (mut session, state) = common::session();
    {
        let mut event = EventFactory::get(&mut session, common::load_dll(1, 2, 0x1000_0000, 0x88));
        let Event::LoadDll(load) = &mut event else {
            panic!("expected a module load event");
        };
        let first = load.file_handle().unwrap();
        let second = load.file_handle().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.raw(), 0x88);
    }

    assert_eq!(state.borrow().closed_handles, vec![0x88]);
}

#[test]
fn test_taken_file_handle_is_not_closed()
{
    let (mut session, state) = common::session();
    let taken = {
        let mut event = EventFactory::get(&mut session, common::create_process(1, 2, IMAGE_BASE, 0x44));
        let Event::CreateProcess(create) = &mut event else {
            panic!("expected a process creation event");
        };
        let taken = create.take_file_handle();
        assert_eq!(create.file_handle(), None);
        taken
    };

    assert_eq!(taken.map(|handle| handle.raw()), Some(0x44));
    assert!(state.borrow().closed_handles.is_empty());
}

#[test]
fn test_invalid_file_handles_are_absent()
{
    let (mut session, state) = common::session();
    for raw in [0, u64::MAX] {
        let mut event = EventFactory::get(&mut session, common::load_dll(1, 2, 0x1000_0000, raw));
        let Event::LoadDll(load) = &mut event else {
            panic!("expected a module load event");
        };
        assert_eq!(load.file_handle(), None);
    }

    assert!(state.borrow().closed_handles.is_empty());
}

#[test]
fn test_debug_info_requires_full_read()
{
    let (mut session, state) = common::session();
    state.borrow_mut().write(1, IMAGE_BASE + 0x200, &[0xAA; 16]);

    let mut info = common::create_process_info(IMAGE_BASE, 0);
    info.debug_info_file_offset = 0x200;
    info.debug_info_size = 16;
    let event = EventFactory::get(&mut session, RawEvent::new(1, 2, DebugInfo::CreateProcess(info)));
    let Event::CreateProcess(create) = &event else {
        panic!("expected a process creation event");
    };
    assert_eq!(create.debug_info(), Some(vec![0xAA; 16]));
    drop(event);

    info.debug_info_size = 32;
    let event = EventFactory::get(&mut session, RawEvent::new(1, 2, DebugInfo::CreateProcess(info)));
    let Event::CreateProcess(create) = &event else {
        panic!("expected a process creation event");
    };
    assert_eq!(create.debug_info(), None);
    drop(event);

    info.debug_info_size = 0;
    let event = EventFactory::get(&mut session, RawEvent::new(1, 2, DebugInfo::CreateProcess(info)));
    let Event::CreateProcess(create) = &event else {
        panic!("expected a process creation event");
    };
    assert_eq!(create.debug_info(), None);
}

#[test]
fn test_ansi_debug_string()
{
    let (mut session, state) = common::session();
    state.borrow_mut().write_ansi(1, 0x9000, "checkpoint reached");

    let event = EventFactory::get(&mut session, common::output_string(1, 2, 0x9000, false, 19));
    let Event::OutputDebugString(output) = &event else {
        panic!("expected a debug string event");
    };

    assert!(!output.is_unicode());
    assert_eq!(output.debug_string().unwrap(), "checkpoint reached");
}

#[test]
fn test_debug_string_read_failure_is_an_error()
{
    let (mut session, _state) = common::session();

    let event = EventFactory::get(&mut session, common::output_string(1, 2, 0x9000, false, 8));
    let Event::OutputDebugString(output) = &event else {
        panic!("expected a debug string event");
    };

    assert!(matches!(output.debug_string(), Err(VigilError::MemoryRead { .. })));
}

#[test]
fn test_payload_accessors()
{
    let (mut session, _state) = common::session();

    let event = EventFactory::get(&mut session, common::create_thread(1, 2, 0x7FFD_D000, 0x40_2000));
    let Event::CreateThread(create) = &event else {
        panic!("expected a thread creation event");
    };
    assert_eq!(create.teb(), Address::from(0x7FFD_D000));
    assert_eq!(create.start_address(), Address::from(0x40_2000));
    assert_eq!(create.thread_handle().map(|h| h.raw()), Some(0x10));
    drop(event);

    let event = EventFactory::get(&mut session, common::create_process(1, 2, IMAGE_BASE, 0));
    let Event::CreateProcess(create) = &event else {
        panic!("expected a process creation event");
    };
    assert_eq!(create.image_base(), Address::from(IMAGE_BASE));
    assert_eq!(create.module_base(), create.image_base());
    assert_eq!(create.process_handle().map(|h| h.raw()), Some(0x20));
    assert!(create.module().is_none());
    drop(event);

    let event = EventFactory::get(&mut session, common::exit_process(1, 2, 0xC000_0005));
    let Event::ExitProcess(exit) = &event else {
        panic!("expected a process termination event");
    };
    assert_eq!(exit.exit_code(), 0xC000_0005);
    drop(event);

    let event = EventFactory::get(&mut session, common::exit_thread(1, 2, 3));
    let Event::ExitThread(exit) = &event else {
        panic!("expected a thread termination event");
    };
    assert_eq!(exit.exit_code(), 3);
    drop(event);

    let event = EventFactory::get(&mut session, common::rip(1, 2, 0x57, 2));
    let Event::Rip(rip) = &event else {
        panic!("expected a RIP event");
    };
    assert_eq!((rip.rip_error(), rip.rip_type()), (0x57, 2));
}
