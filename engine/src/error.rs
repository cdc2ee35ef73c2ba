//! Error types for the offload engine.
//!
//! `EngineError` covers the failures that can end a run. Scan and index faults
//! never reach the caller as errors: they are logged where they happen and the
//! affected volume is treated as empty. Only copy faults and misuse of the job
//! lifecycle propagate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::RunState;

/// Errors that stop a transfer run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to read from a source file
    #[error("Failed to read file: {}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write to a destination file
    #[error("Failed to write file: {}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a directory in the destination archive
    #[error("Failed to create directory: {}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to enumerate a directory
    #[error("Failed to enumerate directory: {}", path.display())]
    EnumerationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Path is empty or otherwise unusable
    #[error("Invalid path: {} ({reason})", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// A job operation was called in the wrong lifecycle state
    #[error("Job is in state {actual:?}; expected {expected:?}")]
    InvalidState { expected: RunState, actual: RunState },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::EnumerationFailed { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
