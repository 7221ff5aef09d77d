//! lockstep
//!
//! Runs work items on a pool of worker threads while presenting their
//! results to an observer as if they had run one after another on a single
//! thread: every observer call happens on the thread that started the run,
//! the events of one item are never interleaved with another's, and each
//! item's output reaches stdout and stderr in one piece.

pub mod config;
pub mod demo;
pub mod error;
pub mod executor;
pub mod marshal;
pub mod models;
pub mod observer;
pub mod output;
pub mod record;
pub mod utils;

pub use error::{ItemError, MarshalError, ObserverError, RunError, WorkerError};
pub use executor::{ParallelSuite, RunReport, SuiteState, DEFAULT_WORKERS};
pub use marshal::{MarshalHandle, Marshaller};
pub use models::{FnItem, ItemContext, ItemId, WorkItem, WorkerId};
pub use observer::{ConsoleReporter, EventLog, Observer, ObserverCall, RecordingObserver};
pub use output::{OutputAggregator, SharedSink, WorkerOutput};
pub use record::{CallLog, Replay};
