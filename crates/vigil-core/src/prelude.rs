//! Common module for library exports

pub use crate::dispatcher::EventDispatcher;
pub use crate::error::{VigilError, VigilResult};
pub use crate::event::{ContinueStatus, Event, EventFactory, ExceptionEvent};
pub use crate::handler::{EventHandler, HandlerName, NoHandler};
pub use crate::hooks::{ApiHookHit, ApiHookSpec, ApiHookTable};
pub use crate::platform::{BreakpointOracle, HandleAccess, HookInstaller, MemoryAccess, Target, ThreadContext, TrapKind};
pub use crate::raw::{DebugInfo, RawEvent};
pub use crate::segment::{LdtEntry, SegmentError, SegmentRegister, Selector};
pub use crate::session::{DebugSession, DispatchOutcome};
pub use crate::types::{Address, ProcessId, ThreadId};
