//! Worker loop
//!
//! A worker claims items until none are left. Each item runs against the
//! worker's recording observer; afterwards the worker publishes its output
//! and replays the recorded events on the coordinator in one hand-off.

use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, trace};

use super::distributor::WorkDistributor;
use crate::error::{panic_message, WorkerError};
use crate::marshal::MarshalHandle;
use crate::models::{Failure, ItemContext, ItemId, WorkItem, WorkerId};
use crate::observer::{Observer, ObserverCall, RecordingObserver};
use crate::output::WorkerOutput;

/// What a worker got through before running out of items
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub items: usize,
    pub events: usize,
}

pub(crate) struct Worker<'s, O: 'static> {
    id: WorkerId,
    distributor: &'s WorkDistributor<'s>,
    marshal: MarshalHandle<O>,
    stdout: WorkerOutput,
    stderr: WorkerOutput,
    recorder: RecordingObserver,
}

impl<'s, O: Observer + 'static> Worker<'s, O> {
    pub(crate) fn new(
        id: WorkerId,
        distributor: &'s WorkDistributor<'s>,
        marshal: MarshalHandle<O>,
        stdout: WorkerOutput,
        stderr: WorkerOutput,
    ) -> Self {
        Self {
            id,
            distributor,
            marshal,
            stdout,
            stderr,
            recorder: RecordingObserver::new(),
        }
    }

    /// Process items until the queue is empty or a hand-off fails
    pub(crate) fn run(mut self) -> Result<WorkerStats, WorkerError> {
        let _exit = ExitGuard {
            worker: self.id,
            distributor: self.distributor,
            marshal: self.marshal.clone(),
        };
        debug!(worker = %self.id, "worker started");

        let mut stats = WorkerStats::default();
        while let Some((id, item)) = self.distributor.claim_next() {
            self.execute_item(&id, item);
            stats.events += self.hand_off()?;
            stats.items += 1;
        }

        debug!(worker = %self.id, items = stats.items, "no items left");
        Ok(stats)
    }

    fn execute_item(&mut self, id: &ItemId, item: &dyn WorkItem) {
        debug!(worker = %self.id, item = %id, "executing");
        self.recorder.record(ObserverCall::Start { item: id.clone() });

        let outcome = {
            let mut ctx = ItemContext::new(
                self.id,
                id,
                &mut self.stdout,
                &mut self.stderr,
                &mut self.recorder,
            );
            panic::catch_unwind(AssertUnwindSafe(|| item.execute(&mut ctx)))
        };

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(Failure::from(&e)),
            Err(payload) => Some(Failure::panic(panic_message(payload.as_ref()))),
        };
        if let Some(failure) = failure {
            debug!(worker = %self.id, item = %id, "{}", failure);
            let item = id.clone();
            self.recorder.record(if failure.is_assertion() {
                ObserverCall::FailedAssertion { item, failure }
            } else {
                ObserverCall::Error { item, failure }
            });
        }

        self.recorder.record(ObserverCall::Finish { item: id.clone() });
    }

    /// Publish buffered output, then deliver the recorded events to the real
    /// observer. Returns the number of events delivered.
    fn hand_off(&mut self) -> Result<usize, WorkerError> {
        let _section = self.distributor.handoff();

        self.stdout.publish();
        self.stderr.publish();

        let batch = self.recorder.take();
        trace!(worker = %self.id, events = batch.len(), "replaying on coordinator");
        let events = self
            .marshal
            .forward(move |observer: &mut O| batch.replay(observer))??;
        Ok(events)
    }
}

/// Counts the worker out however it leaves its loop. The last worker out
/// stops the dispatch loop.
struct ExitGuard<'s, O: 'static> {
    worker: WorkerId,
    distributor: &'s WorkDistributor<'s>,
    marshal: MarshalHandle<O>,
}

impl<O: 'static> Drop for ExitGuard<'_, O> {
    fn drop(&mut self) {
        if self.distributor.worker_exited() {
            debug!(worker = %self.worker, "last worker out, stopping dispatch loop");
            self.marshal.stop();
        }
    }
}
