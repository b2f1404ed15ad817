//! imgscope Core - Foundational Types and Abstractions
//!
//! This module provides the types shared across the imgscope crates:
//! the error taxonomy, processing options, source kinds, the logger and
//! event-publisher hooks, and runtime configuration.

pub mod config;
pub mod error;
pub mod event;
pub mod log;
pub mod option;
pub mod source;

// Re-export commonly used types
pub use config::ScopeConfig;
pub use error::{Result, ScopeError};
pub use event::{BroadcastPublisher, EventPayload, EventPublisher, ImageEvent, NoopPublisher};
pub use log::{LogLevel, Logger, NoopLogger, TracingLogger};
pub use option::ProcessingOption;
pub use source::SourceKind;

/// imgscope version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
