//! Shared test fixtures: an in-memory target and raw event builders.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use vigil_core::constants::EXCEPTION_MAXIMUM_PARAMETERS;
use vigil_core::error::{VigilError, VigilResult};
use vigil_core::hooks::{ApiHookHit, ApiHookSpec};
use vigil_core::platform::{BreakpointOracle, HandleAccess, HookInstaller, MemoryAccess, ThreadContext, TrapKind};
use vigil_core::raw::{
    CreateProcessDebugInfo, CreateThreadDebugInfo, DebugInfo, ExceptionDebugInfo, ExceptionRecord,
    ExitProcessDebugInfo, ExitThreadDebugInfo, LoadDllDebugInfo, OutputDebugStringInfo, RawEvent, RipInfo,
    UnloadDllDebugInfo,
};
use vigil_core::segment::{LdtEntry, SegmentRegister};
use vigil_core::session::DebugSession;
use vigil_core::types::{Address, FileHandle, ProcessId, ThreadId};
use vigil_utils::{init_logging_with_level, LogFormat, LogLevel};

/// Everything the mock target knows, shared with the test through `Rc`.
#[derive(Debug, Default)]
pub struct MockState
{
    pub memory: Vec<(ProcessId, Address, Vec<u8>)>,
    pub file_names: HashMap<u64, String>,
    pub closed_handles: Vec<u64>,
    pub process_images: HashMap<ProcessId, String>,
    pub installed_hooks: Vec<(ProcessId, String, String)>,
    pub failing_symbols: HashSet<String>,
    pub owned_traps: HashSet<Address>,
    pub hook_hits: HashMap<Address, ApiHookHit>,
    pub trap_query_fails: bool,
    pub segment_registers: HashMap<(ThreadId, SegmentRegister), u16>,
    pub descriptors: HashMap<u16, LdtEntry>,
}

impl MockState
{
    pub fn write(&mut self, pid: u32, address: u64, bytes: &[u8])
    {
        self.memory.push((ProcessId(pid), Address::from(address), bytes.to_vec()));
    }

    pub fn write_ansi(&mut self, pid: u32, address: u64, text: &str)
    {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.write(pid, address, &bytes);
    }

    pub fn write_utf16(&mut self, pid: u32, address: u64, text: &str)
    {
        let mut bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        bytes.extend_from_slice(&[0, 0]);
        self.write(pid, address, &bytes);
    }

    pub fn write_pointer(&mut self, pid: u32, address: u64, value: u64)
    {
        self.write(pid, address, &value.to_le_bytes());
    }

    pub fn hook_count(&self, pid: u32) -> usize
    {
        self.installed_hooks.iter().filter(|(p, _, _)| p.0 == pid).count()
    }
}

/// A [`Target`](vigil_core::platform::Target) backed by [`MockState`].
#[derive(Debug, Clone, Default)]
pub struct MockTarget
{
    pub state: Rc<RefCell<MockState>>,
}

impl MockTarget
{
    pub fn new() -> (Self, Rc<RefCell<MockState>>)
    {
        let target = Self::default();
        let state = Rc::clone(&target.state);
        (target, state)
    }
}

impl MemoryAccess for MockTarget
{
    fn read_memory(&self, pid: ProcessId, address: Address, size: usize) -> VigilResult<Vec<u8>>
    {
        let state = self.state.borrow();
        for (owner, base, bytes) in &state.memory {
            if *owner != pid || address < *base {
                continue;
            }
            let Ok(offset) = usize::try_from(address.value() - base.value()) else {
                continue;
            };
            if offset < bytes.len() {
                let end = bytes.len().min(offset + size);
                return Ok(bytes[offset..end].to_vec());
            }
        }
        Err(VigilError::MemoryRead {
            address,
            size,
            details: "unmapped".to_string(),
        })
    }
}

impl HandleAccess for MockTarget
{
    fn file_name(&self, handle: FileHandle) -> Option<String>
    {
        self.state.borrow().file_names.get(&handle.raw()).cloned()
    }

    fn close_handle(&mut self, handle: FileHandle) -> VigilResult<()>
    {
        self.state.borrow_mut().closed_handles.push(handle.raw());
        Ok(())
    }

    fn process_image_name(&self, pid: ProcessId) -> Option<String>
    {
        self.state.borrow().process_images.get(&pid).cloned()
    }
}

impl ThreadContext for MockTarget
{
    fn segment_register(&self, tid: ThreadId, register: SegmentRegister) -> VigilResult<u16>
    {
        self.state
            .borrow()
            .segment_registers
            .get(&(tid, register))
            .copied()
            .ok_or_else(|| VigilError::InvalidArgument(format!("no {register} for thread {tid}")))
    }

    fn selector_entry(&self, _tid: ThreadId, selector: u16) -> VigilResult<LdtEntry>
    {
        self.state
            .borrow()
            .descriptors
            .get(&selector)
            .copied()
            .ok_or_else(|| VigilError::InvalidArgument(format!("no descriptor for selector {selector}")))
    }
}

impl HookInstaller for MockTarget
{
    fn install_api_hook(&mut self, pid: ProcessId, module: &str, spec: &ApiHookSpec) -> VigilResult<()>
    {
        let mut state = self.state.borrow_mut();
        if state.failing_symbols.contains(&spec.symbol) {
            return Err(VigilError::HookInstall {
                module: module.to_string(),
                symbol: spec.symbol.clone(),
                details: "export not found".to_string(),
            });
        }
        state.installed_hooks.push((pid, module.to_string(), spec.symbol.clone()));
        Ok(())
    }

    fn api_hook_hit(&self, _pid: ProcessId, _tid: ThreadId, address: Address) -> VigilResult<Option<ApiHookHit>>
    {
        Ok(self.state.borrow().hook_hits.get(&address).cloned())
    }
}

impl BreakpointOracle for MockTarget
{
    fn owns_trap(&self, _pid: ProcessId, _tid: ThreadId, _kind: TrapKind, address: Address) -> VigilResult<bool>
    {
        let state = self.state.borrow();
        if state.trap_query_fails {
            return Err(VigilError::InvalidArgument("breakpoint table unavailable".to_string()));
        }
        Ok(state.owned_traps.contains(&address))
    }
}

/// Send engine logs to the console. Only the first call in a test binary
/// installs the subscriber; `RUST_LOG` overrides the level.
pub fn init_logging()
{
    let _ = init_logging_with_level(LogLevel::Warn, LogFormat::Pretty);
}

/// A session over a fresh mock target.
pub fn session() -> (DebugSession, Rc<RefCell<MockState>>)
{
    init_logging();
    let (target, state) = MockTarget::new();
    (DebugSession::new(target), state)
}

pub fn exception(pid: u32, tid: u32, code: u32, address: u64, first_chance: bool, information: &[u64]) -> RawEvent
{
    assert!(information.len() <= EXCEPTION_MAXIMUM_PARAMETERS);
    let record = ExceptionRecord::new(code, Address::from(address)).with_information(information);
    RawEvent::new(pid, tid, DebugInfo::Exception(ExceptionDebugInfo { record, first_chance }))
}

pub fn exception_record(pid: u32, tid: u32, record: ExceptionRecord, first_chance: bool) -> RawEvent
{
    RawEvent::new(pid, tid, DebugInfo::Exception(ExceptionDebugInfo { record, first_chance }))
}

pub fn create_thread(pid: u32, tid: u32, teb: u64, start: u64) -> RawEvent
{
    RawEvent::new(
        pid,
        tid,
        DebugInfo::CreateThread(CreateThreadDebugInfo {
            thread_handle: 0x10,
            thread_local_base: Address::from(teb),
            start_address: Address::from(start),
        }),
    )
}

pub fn create_process(pid: u32, tid: u32, base: u64, file_handle: u64) -> RawEvent
{
    RawEvent::new(pid, tid, DebugInfo::CreateProcess(create_process_info(base, file_handle)))
}

pub fn create_process_info(base: u64, file_handle: u64) -> CreateProcessDebugInfo
{
    CreateProcessDebugInfo {
        file_handle,
        process_handle: 0x20,
        thread_handle: 0x24,
        base_of_image: Address::from(base),
        thread_local_base: Address::from(0x7FFD_E000),
        start_address: Address::from(base + 0x1000),
        ..CreateProcessDebugInfo::default()
    }
}

pub fn exit_thread(pid: u32, tid: u32, exit_code: u32) -> RawEvent
{
    RawEvent::new(pid, tid, DebugInfo::ExitThread(ExitThreadDebugInfo { exit_code }))
}

pub fn exit_process(pid: u32, tid: u32, exit_code: u32) -> RawEvent
{
    RawEvent::new(pid, tid, DebugInfo::ExitProcess(ExitProcessDebugInfo { exit_code }))
}

pub fn load_dll(pid: u32, tid: u32, base: u64, file_handle: u64) -> RawEvent
{
    RawEvent::new(pid, tid, DebugInfo::LoadDll(load_dll_info(base, file_handle)))
}

pub fn load_dll_info(base: u64, file_handle: u64) -> LoadDllDebugInfo
{
    LoadDllDebugInfo {
        file_handle,
        base_of_dll: Address::from(base),
        ..LoadDllDebugInfo::default()
    }
}

pub fn unload_dll(pid: u32, tid: u32, base: u64) -> RawEvent
{
    RawEvent::new(
        pid,
        tid,
        DebugInfo::UnloadDll(UnloadDllDebugInfo {
            base_of_dll: Address::from(base),
        }),
    )
}

pub fn output_string(pid: u32, tid: u32, data: u64, unicode: bool, length: u16) -> RawEvent
{
    RawEvent::new(
        pid,
        tid,
        DebugInfo::OutputDebugString(OutputDebugStringInfo {
            data: Address::from(data),
            unicode,
            length,
        }),
    )
}

pub fn rip(pid: u32, tid: u32, error: u32, kind: u32) -> RawEvent
{
    RawEvent::new(pid, tid, DebugInfo::Rip(RipInfo { error, kind }))
}
