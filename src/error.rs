//! Error types for the reduction pipeline.

use thiserror::Error;

/// Category of a [`ReductionError`], for callers that only care which
/// stage of the pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Detected before any device work was issued.
    Configuration,
    /// The kernel failed to build.
    Compilation,
    /// Kernel creation, argument binding, enqueue or execution failed.
    Dispatch,
    /// A buffer could not be created, written or read back.
    Transfer,
}

/// Main error type for the reduction pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReductionError {
    /// Invalid layout, or a layout the selected device cannot run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Kernel source failed to build. The build log is kept verbatim.
    #[error("kernel compilation failed:\n{build_log}")]
    Compilation { build_log: String },

    /// The device reported a non-success status while dispatching.
    /// `status` is the runtime's code, `None` when the host detected the
    /// problem itself.
    #[error("dispatch failed during {stage}{}", status_suffix(.status))]
    Dispatch {
        stage: &'static str,
        status: Option<i32>,
    },

    /// A host/device buffer transfer failed, or the device returned a
    /// result buffer of the wrong shape.
    #[error("buffer transfer failed during {stage}{}", status_suffix(.status))]
    Transfer {
        stage: &'static str,
        status: Option<i32>,
    },
}

fn status_suffix(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!(" (status {})", code),
        None => String::new(),
    }
}

impl ReductionError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReductionError::Configuration(_) => ErrorKind::Configuration,
            ReductionError::Compilation { .. } => ErrorKind::Compilation,
            ReductionError::Dispatch { .. } => ErrorKind::Dispatch,
            ReductionError::Transfer { .. } => ErrorKind::Transfer,
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        ReductionError::Configuration(msg.into())
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ReductionError>;
