use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

use crate::config::RunMode;

/// Which tier of the run tree produced a dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Container,
    Process,
    Dependency,
}

impl fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorScope::Container => write!(f, "container"),
            ErrorScope::Process => write!(f, "process"),
            ErrorScope::Dependency => write!(f, "dependency"),
        }
    }
}

/// The dispatched operation that failed to resolve a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Initialization,
    Run,
    Fix,
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchPhase::Initialization => write!(f, "initialization"),
            DispatchPhase::Run => write!(f, "run"),
            DispatchPhase::Fix => write!(f, "run fix"),
        }
    }
}

/// Errors produced by the orchestration engine.
///
/// Every public failure point is subject to the `raise_exceptions` policy on
/// the run configuration: with the flag set the error propagates unmodified,
/// without it the error is converted into a failure message and a falsy
/// result. The single exception is [`EngineError::NoHandler`], which always
/// reaches the caller.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Container(String),

    #[error("{0}")]
    Process(String),

    #[error("{0}")]
    Dependency(String),

    /// No handler is installed for any run mode in the fallback order.
    #[error("{scope}: no {phase} method is available for run mode \"{mode}\"")]
    NoHandler {
        scope: ErrorScope,
        phase: DispatchPhase,
        mode: RunMode,
    },

    #[error("data file does not exist: {0}")]
    DataFileDoesNotExist(Utf8PathBuf),

    #[error("data file could not be parsed: {0}")]
    DataFileParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether this error is a dispatch failure that bypasses the
    /// `raise_exceptions` policy.
    pub fn is_no_handler(&self) -> bool {
        matches!(self, EngineError::NoHandler { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
