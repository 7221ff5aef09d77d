//! Work item models
//!
//! Identities of workers and items, the work item contract, and the context
//! handed to an item while it runs.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Failure;
use crate::error::ItemError;
use crate::observer::{ObserverCall, RecordingObserver};
use crate::output::WorkerOutput;

/// Identity of a worker thread within a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(usize);

impl WorkerId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Identity of a work item as observers see it
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId {
    /// Position in the suite (0-based)
    pub index: usize,
    pub name: String,
}

impl ItemId {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }

    /// 1-based item number for display
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item {}: {}", self.number(), self.name)
    }
}

/// A unit of work the suite distributes to workers.
///
/// `execute` runs on a worker thread. Output should go through
/// [`ItemContext::stdout`] and [`ItemContext::stderr`] so it is published in
/// one piece when the item is handed off. Start and finish events are
/// recorded by the worker; returning an error records a failure event.
/// Further failures can be reported with [`ItemContext::report`].
pub trait WorkItem: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, ctx: &mut ItemContext<'_>) -> Result<(), ItemError>;
}

/// Work item backed by a closure
pub struct FnItem<F> {
    name: String,
    body: F,
}

impl<F> FnItem<F>
where
    F: Fn(&mut ItemContext<'_>) -> Result<(), ItemError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<F> WorkItem for FnItem<F>
where
    F: Fn(&mut ItemContext<'_>) -> Result<(), ItemError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut ItemContext<'_>) -> Result<(), ItemError> {
        (self.body)(ctx)
    }
}

/// What a work item gets to see of the worker running it
pub struct ItemContext<'a> {
    worker: WorkerId,
    item: &'a ItemId,
    stdout: &'a mut WorkerOutput,
    stderr: &'a mut WorkerOutput,
    recorder: &'a mut RecordingObserver,
}

impl<'a> ItemContext<'a> {
    pub(crate) fn new(
        worker: WorkerId,
        item: &'a ItemId,
        stdout: &'a mut WorkerOutput,
        stderr: &'a mut WorkerOutput,
        recorder: &'a mut RecordingObserver,
    ) -> Self {
        Self {
            worker,
            item,
            stdout,
            stderr,
            recorder,
        }
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn item(&self) -> &ItemId {
        self.item
    }

    /// Buffered standard output of this worker.
    ///
    /// The handle can be cloned into threads the item spawns; their output is
    /// attributed to this worker.
    pub fn stdout(&mut self) -> &mut WorkerOutput {
        &mut *self.stdout
    }

    /// Buffered standard error of this worker
    pub fn stderr(&mut self) -> &mut WorkerOutput {
        &mut *self.stderr
    }

    /// Report a failure of the running item without ending it. Assertion
    /// failures reach the observer as failed assertions, anything else as
    /// errors, between the item's start and finish events.
    pub fn report(&mut self, failure: Failure) {
        let item = self.item.clone();
        self.recorder.record(if failure.is_assertion() {
            ObserverCall::FailedAssertion { item, failure }
        } else {
            ObserverCall::Error { item, failure }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{MemorySink, OutputAggregator};

    #[test]
    fn test_worker_id_display() {
        assert_eq!(WorkerId::new(3).to_string(), "worker-3");
        assert_eq!(WorkerId::new(3).index(), 3);
    }

    #[test]
    fn test_item_id() {
        let id = ItemId::new(0, "parse headers");
        assert_eq!(id.number(), 1);
        assert_eq!(id.to_string(), "Item 1: parse headers");
    }

    #[test]
    fn test_report_is_bound_to_item() {
        let id = ItemId::new(2, "lookup");
        let output = OutputAggregator::new(MemorySink::new().shared());
        let mut stdout = output.writer(WorkerId::new(0));
        let mut stderr = stdout.clone();
        let mut recorder = RecordingObserver::new();

        let mut ctx = ItemContext::new(WorkerId::new(0), &id, &mut stdout, &mut stderr, &mut recorder);
        ctx.report(Failure::assertion("expected 1, got 2"));
        ctx.report(Failure::error("timed out"));

        let calls = recorder.log().calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[0], ObserverCall::FailedAssertion { item, .. } if item == &id));
        assert!(matches!(&calls[1], ObserverCall::Error { item, .. } if item == &id));
    }

    #[test]
    fn test_fn_item_name() {
        let item = FnItem::new("noop", |_ctx: &mut ItemContext<'_>| Ok(()));
        assert_eq!(item.name(), "noop");
    }
}
