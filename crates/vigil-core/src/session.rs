//! # Debug Session
//!
//! A [`DebugSession`] ties together what one debugger instance knows about its
//! targets (the [`System`] snapshot) and how it reaches them (a [`Target`]).
//! Events borrow the session mutably for the length of one dispatch cycle.
//!
//! ## Example
//!
//! ```rust,ignore
//! use vigil_core::dispatcher::EventDispatcher;
//! use vigil_core::session::DebugSession;
//!
//! let mut session = DebugSession::new(my_target);
//! let mut dispatcher = EventDispatcher::new(Some(MyHandler::default()));
//!
//! loop {
//!     let raw = wait_for_debug_event()?;
//!     let outcome = session.dispatch(&mut dispatcher, raw)?;
//!     continue_debug_event(outcome.pid, outcome.tid, outcome.continue_status.as_raw())?;
//! }
//! ```

use std::fmt;

use crate::dispatcher::EventDispatcher;
use crate::error::VigilResult;
use crate::event::{ContinueStatus, EventFactory};
use crate::handler::EventHandler;
use crate::platform::Target;
use crate::raw::RawEvent;
use crate::segment::{resolve_linear_address, Selector};
use crate::types::{ProcessId, System, ThreadId};

/// Result of one full dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome<T>
{
    /// Process to resume.
    pub pid: ProcessId,
    /// Thread to resume.
    pub tid: ThreadId,
    /// Status to resume it with.
    pub continue_status: ContinueStatus,
    /// What the user handler returned, if it ran.
    pub value: Option<T>,
}

/// One debugger instance: the snapshot plus the target collaborator.
pub struct DebugSession
{
    system: System,
    target: Box<dyn Target>,
}

impl DebugSession
{
    /// Create a session with an empty snapshot.
    pub fn new(target: impl Target + 'static) -> Self
    {
        Self {
            system: System::new(),
            target: Box::new(target),
        }
    }

    #[must_use]
    pub fn system(&self) -> &System
    {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut System
    {
        &mut self.system
    }

    #[must_use]
    pub fn target(&self) -> &dyn Target
    {
        self.target.as_ref()
    }

    pub fn target_mut(&mut self) -> &mut dyn Target
    {
        self.target.as_mut()
    }

    /// Run one notification through `dispatcher` and report how to resume.
    ///
    /// The event is dropped before returning, which closes any file handle
    /// it still owns.
    ///
    /// # Errors
    ///
    /// Bookkeeping or user handler failures, after cleanup has run.
    pub fn dispatch<H: EventHandler>(
        &mut self,
        dispatcher: &mut EventDispatcher<H>,
        raw: RawEvent,
    ) -> VigilResult<DispatchOutcome<H::Output>>
    {
        let mut event = EventFactory::get(self, raw);
        let value = dispatcher.dispatch(&mut event)?;
        Ok(DispatchOutcome {
            pid: event.pid(),
            tid: event.tid(),
            continue_status: event.continue_status(),
            value,
        })
    }

    /// Linear address of `selector:offset` in thread `tid`.
    ///
    /// The thread must be suspended.
    ///
    /// # Errors
    ///
    /// `Segment` when the descriptor rejects the offset, or whatever the
    /// target reports when the register or descriptor cannot be read.
    pub fn linear_address(&self, tid: ThreadId, selector: impl Into<Selector>, offset: u32) -> VigilResult<u32>
    {
        resolve_linear_address(self.target(), tid, selector.into(), offset)
    }
}

impl fmt::Debug for DebugSession
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("DebugSession").field("system", &self.system).finish_non_exhaustive()
    }
}
