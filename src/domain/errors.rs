//! Structured error types for trapscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//!
//! The taxonomy mirrors the failure model of the measurement pipeline:
//! configuration problems are caught before any device interaction, protocol
//! problems abort the in-progress run, and export problems never corrupt
//! collected data.

use super::types::TrapId;
use thiserror::Error;

/// Fatal configuration problems, raised before any device interaction.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Function {signature} needs more than {limit} traps")]
    TrapSpaceExhausted { signature: String, limit: u16 },

    #[error("Trap ID space exhausted: function slot {slot} does not fit into 16 bits")]
    TrapIdOverflow { slot: u16 },

    #[error("Duplicate trap ID {0} in trap table")]
    DuplicateTrap(TrapId),

    #[error("No traps found for {0}; was the executable instrumented?")]
    EmptyTrapTable(String),

    #[error("Profiling target {signature} not valid in {mode} mode: {reason}")]
    InvalidTarget { signature: String, mode: String, reason: String },

    #[error("Expected exactly one instruction dispatch switch, found {found}. \
             Adapt the entry point so a single switch routes instructions.")]
    AmbiguousDispatcher { found: usize },

    #[error("Dispatcher already handles instruction 0x{code:02x} with an incompatible body: {detail}")]
    IncompatibleDispatcherPatch { code: u8, detail: String },

    #[error("Input {input} is not a valid even-length hex string")]
    InvalidInput { input: String },

    #[error("Input file {path} produced no usable inputs")]
    EmptyInputSource { path: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Channel I/O failure. Never retried: a call after a suspected partial
/// failure cannot be trusted to observe the same device state.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device channel closed: {0}")]
    ChannelClosed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Fatal errors raised while the measurement protocol is running.
///
/// Any of these aborts the current function's run; partial samples are
/// discarded and no report is emitted for it.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unexpected status word 0x{sw:04x} while profiling {trap}")]
    Desync { trap: TrapId, sw: u16 },

    #[error("{command} failed with status word 0x{sw:04x}")]
    CommandFailed { command: String, sw: u16 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),
}

/// Top-level failure of one profiling run.
#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Failures while persisting the raw measurement export.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to serialize report: {0}")]
    SerializationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desync_error_display() {
        let err = ProtocolError::Desync { trap: TrapId(7), sw: 0x6f00 };
        assert_eq!(err.to_string(), "Unexpected status word 0x6f00 while profiling trap#7");
    }

    #[test]
    fn trap_space_exhausted_names_function() {
        let err = ConfigError::TrapSpaceExhausted {
            signature: "Example.process(APDU)".to_string(),
            limit: 100,
        };
        assert!(err.to_string().contains("Example.process(APDU)"));
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn transport_wraps_into_protocol() {
        let err: ProtocolError =
            TransportError::ChannelClosed("reader unplugged".to_string()).into();
        assert!(matches!(err, ProtocolError::Transport(_)));
    }
}
