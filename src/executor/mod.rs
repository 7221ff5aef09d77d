//! Parallel execution engine
//!
//! Distributes work items over a pool of worker threads and funnels their
//! observer events back to the thread that started the run.

mod distributor;
mod suite;
mod worker;

pub use distributor::{HandOff, WorkDistributor};
pub use suite::{ParallelSuite, RunReport, SuiteState, DEFAULT_WORKERS};
pub use worker::WorkerStats;
