//! Error types
//!
//! Failures of the coordination machinery, of observers and of whole runs.
//! Item-level failures are ordinary events and only become errors here when
//! they break an invariant.

use std::any::Any;
use thiserror::Error;

use crate::executor::SuiteState;
use crate::models::WorkerId;

/// The dispatch loop could not execute a forwarded call
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MarshalError {
    #[error("dispatch loop is no longer accepting calls")]
    Stopped,

    #[error("call was discarded before the dispatch loop executed it")]
    Dropped,
}

/// Raised by an observer while handling an event
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("observer rejected event for {item}: {reason}")]
    Rejected { item: String, reason: String },

    #[error("observer I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ObserverError {
    pub fn rejected(item: impl ToString, reason: impl Into<String>) -> Self {
        ObserverError::Rejected {
            item: item.to_string(),
            reason: reason.into(),
        }
    }
}

/// Returned by a work item that did not complete successfully
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ItemError {
    /// Assertion-style failure, reported as a failed assertion rather than an error
    pub fn assertion(message: impl Into<String>) -> Self {
        ItemError::Assertion(message.into())
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, ItemError::Assertion(_))
    }
}

/// Why a worker stopped before the work queue was drained
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("marshalling failed: {0}")]
    Marshal(#[from] MarshalError),

    #[error("observer failed during hand-off: {0}")]
    Observer(#[from] ObserverError),

    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// Failure of a suite run as a whole
#[derive(Debug, Error)]
pub enum RunError {
    #[error("pool size must be at least 1")]
    InvalidPoolSize,

    #[error("suite is already {0}")]
    AlreadyRunning(SuiteState),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{worker} failed: {source}")]
    Worker {
        worker: WorkerId,
        #[source]
        source: WorkerError,
    },
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
