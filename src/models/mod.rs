//! Data models for suite runs
//!
//! Worker and item identities, the work item contract, and result types.

mod item;
mod result;

pub use item::{FnItem, ItemContext, ItemId, WorkItem, WorkerId};
pub use result::{Failure, FailureKind, ItemResult, ItemStatus, RunSummary};
