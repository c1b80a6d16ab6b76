//! Domain model for trapscope
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{
    InputDivision, MemoryKind, Mode, TargetKind, TimeUnit, TrapId, PERF_START,
};

pub use errors::{ConfigError, ExportError, ProfilerError, ProtocolError, TransportError};
