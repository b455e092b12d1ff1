//! # Vigil Utilities
//!
//! Shared utilities, logging, and configuration helpers for Vigil.
//!
//! `vigil-core` emits structured `tracing` events while it classifies and
//! dispatches debug events; this crate decides where those events end up.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_logging, init_logging_from_config, init_logging_with_level, LogFormat, LogLevel, LoggingConfig, LoggingError,
    LoggingGuard,
};
pub use tracing::{debug, error, info, trace, warn};
