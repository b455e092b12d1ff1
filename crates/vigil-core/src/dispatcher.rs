//! # Event Dispatcher
//!
//! Runs one event through the three stages of a dispatch cycle:
//!
//! 1. **Pre-handler**: session bookkeeping that must happen before the user
//!    sees the event, e.g. registering a new thread. Returns whether the user
//!    handler should run. An error here ends the cycle.
//! 2. **User handler**: the registered [`EventHandler`], if any.
//! 3. **Post-handler**: cleanup that must happen after the user is done with
//!    the event, e.g. removing an exited process from the snapshot.
//!
//! The post-handler runs no matter how stage 2 ends: with a value, with an
//! error, or by panicking. A user handler error is returned after the
//! post-handler ran; a panic resumes after it ran.
//!
//! Pre- and post-handlers are picked from fixed tables (see
//! [`notify`](crate::notify)). For exceptions the exception-code table is
//! consulted first.

use std::panic::{self, AssertUnwindSafe};

use tracing::{trace, warn};

use crate::error::VigilResult;
use crate::event::Event;
use crate::handler::{EventHandler, HandlerDispatch, NoHandler};
use crate::notify::NotifyRoutine;

/// Drives the pre-handler / user handler / post-handler sequence.
#[derive(Debug)]
pub struct EventDispatcher<H>
{
    handler: Option<HandlerDispatch<H>>,
}

impl<H: EventHandler> EventDispatcher<H>
{
    /// Create a dispatcher. With `None`, only bookkeeping runs.
    pub fn new(handler: Option<H>) -> Self
    {
        Self {
            handler: handler.map(HandlerDispatch::new),
        }
    }

    #[must_use]
    pub fn handler(&self) -> Option<&HandlerDispatch<H>>
    {
        self.handler.as_ref()
    }

    pub fn handler_mut(&mut self) -> Option<&mut HandlerDispatch<H>>
    {
        self.handler.as_mut()
    }

    /// Replace the user handler, returning the previous one.
    pub fn set_handler(&mut self, handler: Option<H>) -> Option<H>
    {
        std::mem::replace(&mut self.handler, handler.map(HandlerDispatch::new)).map(HandlerDispatch::into_inner)
    }

    /// Dispatch one event.
    ///
    /// Returns `Ok(Some(value))` with the user handler's value, or `Ok(None)`
    /// when no user handler ran.
    ///
    /// # Errors
    ///
    /// - a pre-handler error, in which case nothing else ran
    /// - a user handler error, after the post-handler ran
    /// - a post-handler error, when the user handler succeeded
    ///
    /// When both the user handler and the post-handler fail, the user
    /// handler's error is returned and the other one is logged.
    pub fn dispatch(&mut self, event: &mut Event<'_>) -> VigilResult<Option<H::Output>>
    {
        let exception_code = event.exception_code();
        let pre = NotifyRoutine::pre(event.code(), exception_code);
        let post = NotifyRoutine::post(event.code(), exception_code);

        let proceed = match pre {
            Some(routine) => {
                trace!(routine = routine.name(), pid = event.pid().0, "pre-handler");
                routine.run(event)?
            }
            None => true,
        };

        let outcome = match self.handler.as_mut().filter(|_| proceed) {
            Some(handler) => panic::catch_unwind(AssertUnwindSafe(|| handler.dispatch(event))).map(|result| result.map(Some)),
            None => Ok(Ok(None)),
        };

        let cleanup = match post {
            Some(routine) => {
                trace!(routine = routine.name(), pid = event.pid().0, "post-handler");
                routine.run(event).map(|_| ())
            }
            None => Ok(()),
        };

        match outcome {
            Err(payload) => {
                if let Err(err) = cleanup {
                    warn!(error = %err, "post-handler failed while a handler panic was unwinding");
                }
                panic::resume_unwind(payload)
            }
            Ok(Err(err)) => {
                if let Err(cleanup_err) = cleanup {
                    warn!(error = %cleanup_err, handler_error = %err, "post-handler failed after handler error");
                }
                Err(err)
            }
            Ok(Ok(value)) => cleanup.map(|()| value),
        }
    }
}

impl EventDispatcher<NoHandler>
{
    /// A dispatcher that only keeps the session snapshot up to date.
    #[must_use]
    pub fn bookkeeping_only() -> Self
    {
        Self::new(None)
    }
}

impl<H: EventHandler> Default for EventDispatcher<H>
{
    fn default() -> Self
    {
        Self::new(None)
    }
}
