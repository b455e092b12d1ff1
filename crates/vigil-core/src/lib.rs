//! # vigil-core
//!
//! Debug-event model and dispatch engine for Windows-style debuggers, plus
//! x86 segment resolution.
//!
//! This crate provides:
//! - A typed view over `DEBUG_EVENT` notifications ([`event`])
//! - Handler dispatch with per-exception fallbacks and API hook activation
//!   ([`handler`], [`hooks`])
//! - The pre-handler / user handler / post-handler cycle that keeps the
//!   session snapshot current ([`dispatcher`], [`notify`])
//! - Linear address computation from segment selectors ([`segment`])
//!
//! ## Platform Support
//!
//! The engine does not call the OS. It consumes [`raw::RawEvent`] values and
//! reaches the debugged system through the traits in [`platform`], so the
//! same code runs against a live Windows target, a recording, or a test mock.
//!
//! ## Example
//!
//! ```rust,ignore
//! use vigil_core::prelude::*;
//!
//! let mut session = DebugSession::new(my_target);
//! let mut dispatcher = EventDispatcher::bookkeeping_only();
//! let outcome = session.dispatch(&mut dispatcher, raw_event)?;
//! resume(outcome.pid, outcome.tid, outcome.continue_status.as_raw());
//! ```

pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod hooks;
pub mod notify;
pub mod platform;
pub mod prelude;
pub mod raw;
pub mod segment;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use dispatcher::EventDispatcher;
pub use error::{VigilError, VigilResult};
pub use event::{ContinueStatus, Event, EventFactory};
pub use handler::{EventHandler, HandlerDispatch};
pub use session::DebugSession;
pub use types::{Address, ProcessId, ThreadId};
