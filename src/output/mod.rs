//! Output handling
//!
//! Per-worker output buffering in front of shared sinks, and formatting of
//! run results.

mod aggregator;
mod formatter;
mod sink;

pub use aggregator::{OutputAggregator, WorkerOutput};
pub use formatter::{OutputFormat, ResultFormatter};
pub use sink::{MemorySink, SharedSink};
