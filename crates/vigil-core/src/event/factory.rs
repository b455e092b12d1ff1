use super::{
    CreateProcessEvent, CreateThreadEvent, Event, EventBase, ExceptionEvent, ExitProcessEvent, ExitThreadEvent,
    LoadDllEvent, OutputDebugStringEvent, RipEvent, UnknownEvent, UnloadDllEvent,
};
use crate::raw::{DebugInfo, RawEvent};
use crate::session::DebugSession;

/// Builds [`Event`]s from raw notifications.
///
/// Stateless: the variant is chosen by the payload, which always agrees with
/// the event code. Payloads with an unrecognized code become
/// [`Event::Unknown`]; [`UnknownCode`](crate::raw::UnknownCode) keeps
/// documented codes out of that variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFactory;

impl EventFactory
{
    /// Wrap `raw` in the matching event variant, bound to `session`.
    pub fn get(session: &mut DebugSession, raw: RawEvent) -> Event<'_>
    {
        let code = raw.code();
        let (pid, tid, info) = raw.into_parts();
        let base = EventBase::new(session, code, pid, tid);

        match info {
            DebugInfo::Exception(info) => Event::Exception(ExceptionEvent::new(base, info)),
            DebugInfo::CreateThread(info) => Event::CreateThread(CreateThreadEvent::new(base, info)),
            DebugInfo::CreateProcess(info) => Event::CreateProcess(CreateProcessEvent::new(base, info)),
            DebugInfo::ExitThread(info) => Event::ExitThread(ExitThreadEvent::new(base, info)),
            DebugInfo::ExitProcess(info) => Event::ExitProcess(ExitProcessEvent::new(base, info)),
            DebugInfo::LoadDll(info) => Event::LoadDll(LoadDllEvent::new(base, info)),
            DebugInfo::UnloadDll(info) => Event::UnloadDll(UnloadDllEvent::new(base, info)),
            DebugInfo::OutputDebugString(info) => Event::OutputDebugString(OutputDebugStringEvent::new(base, info)),
            DebugInfo::Rip(info) => Event::Rip(RipEvent::new(base, info)),
            DebugInfo::Unknown(_) => Event::Unknown(UnknownEvent::new(base)),
        }
    }
}
