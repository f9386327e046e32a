//! # Host Error Types

use tandem_core::EventError;
use thiserror::Error;

/// Errors raised by the registry, scheduler and driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// A channel operation failed.
    #[error(transparent)]
    Event(#[from] EventError),

    /// The event type was never registered.
    #[error("event type not registered: {0}")]
    UnregisteredEvent(&'static str),

    /// The event type was registered twice.
    #[error("event type registered twice: {0}")]
    DuplicateEvent(&'static str),

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;
