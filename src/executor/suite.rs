//! Parallel suite
//!
//! Runs work items on a pool of worker threads while the observer sees one
//! item at a time, on the thread that started the run.

use parking_lot::Mutex;
use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use super::distributor::WorkDistributor;
use super::worker::Worker;
use crate::error::{panic_message, RunError, WorkerError};
use crate::marshal::Marshaller;
use crate::models::{WorkItem, WorkerId};
use crate::observer::Observer;
use crate::output::{OutputAggregator, SharedSink};
use crate::utils::Timer;

/// Pool size used when none is configured
pub const DEFAULT_WORKERS: usize = 4;

/// Lifecycle of a suite run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuiteState {
    NotStarted,
    Running,
    /// Every worker has exited; the dispatch loop is finishing queued calls
    Draining,
    Finished,
}

impl fmt::Display for SuiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuiteState::NotStarted => "not started",
            SuiteState::Running => "running",
            SuiteState::Draining => "draining",
            SuiteState::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Counters of a completed run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Items executed and handed off
    pub items: usize,
    pub workers: usize,
    /// Calls executed by the dispatch loop
    pub dispatched: usize,
    /// Observer events delivered
    pub events: usize,
    pub handoffs: usize,
    /// Some buffered output could not be written to its sink
    pub output_error: bool,
    pub elapsed: Duration,
}

/// Work items executed by a fixed pool of workers
pub struct ParallelSuite {
    name: String,
    items: Vec<Box<dyn WorkItem>>,
    workers: usize,
    stdout: SharedSink,
    stderr: SharedSink,
    state: Mutex<SuiteState>,
}

impl ParallelSuite {
    pub fn new(workers: usize) -> Self {
        Self {
            name: "suite".to_string(),
            items: Vec::new(),
            workers,
            stdout: SharedSink::stdout(),
            stderr: SharedSink::stderr(),
            state: Mutex::new(SuiteState::NotStarted),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn add_item(&mut self, item: impl WorkItem + 'static) {
        self.items.push(Box::new(item));
    }

    pub fn with_item(mut self, item: impl WorkItem + 'static) -> Self {
        self.add_item(item);
        self
    }

    /// Sinks that published item output is appended to
    pub fn with_output(mut self, stdout: SharedSink, stderr: SharedSink) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn state(&self) -> SuiteState {
        *self.state.lock()
    }

    /// Run every item and deliver its events to `observer`.
    ///
    /// Blocks until all workers are done. The observer is only called from
    /// the current thread, and the events of one item (start, failures,
    /// finish) are never interleaved with those of another. An item's output
    /// reaches the sinks before its events reach the observer.
    ///
    /// Item failures are reported to the observer and do not fail the run.
    /// An observer error or panic ends the worker handing off that item; the
    /// other workers carry on and the first such failure is returned once
    /// the run is over.
    ///
    /// The current thread must not be driving an async runtime.
    pub fn run<O: Observer + 'static>(&self, observer: &mut O) -> Result<RunReport, RunError> {
        if self.workers == 0 {
            return Err(RunError::InvalidPoolSize);
        }
        self.begin()?;

        let timer = Timer::start(format!("run {}", self.name));
        info!(
            suite = %self.name,
            items = self.items.len(),
            workers = self.workers,
            "starting run"
        );

        let stdout = OutputAggregator::new(self.stdout.clone());
        let stderr = OutputAggregator::new(self.stderr.clone());
        let distributor = WorkDistributor::new(&self.items, self.workers, &self.state);
        let mut marshaller = Marshaller::<O>::new();
        let handle = marshaller.handle();

        let (dispatched, outcomes, spawn_error) = thread::scope(|scope| {
            let mut joins = Vec::with_capacity(self.workers);
            let mut spawn_error = None;

            for index in 0..self.workers {
                let id = WorkerId::new(index);
                let worker = Worker::new(
                    id,
                    &distributor,
                    handle.clone(),
                    stdout.writer(id),
                    stderr.writer(id),
                );
                let spawned = thread::Builder::new()
                    .name(format!("lockstep-worker-{index}"))
                    .spawn_scoped(scope, move || worker.run());

                match spawned {
                    Ok(join) => joins.push((id, join)),
                    Err(e) => {
                        error!(worker = %id, "failed to spawn worker thread: {}", e);
                        if distributor.abandon(self.workers - index) {
                            handle.stop();
                        }
                        spawn_error = Some(e);
                        break;
                    }
                }
            }

            let dispatched = marshaller.run(observer);
            let outcomes: Vec<_> = joins
                .into_iter()
                .map(|(id, join)| (id, join.join()))
                .collect();
            (dispatched, outcomes, spawn_error)
        });

        // Output of a worker that died mid-item is still pending
        stdout.publish_all();
        stderr.publish_all();
        let output_error = stdout.check_error() || stderr.check_error();
        if output_error {
            warn!(suite = %self.name, "some item output could not be written");
        }
        *self.state.lock() = SuiteState::Finished;

        let mut report = RunReport {
            items: 0,
            workers: self.workers,
            dispatched,
            events: 0,
            handoffs: distributor.handoffs(),
            output_error,
            elapsed: Duration::ZERO,
        };

        let mut first_failure = None;
        for (worker, outcome) in outcomes {
            let result = outcome
                .unwrap_or_else(|payload| Err(WorkerError::Panicked(panic_message(payload.as_ref()))));
            match result {
                Ok(stats) => {
                    report.items += stats.items;
                    report.events += stats.events;
                }
                Err(e) => {
                    error!(%worker, "worker failed: {}", e);
                    if first_failure.is_none() {
                        first_failure = Some(RunError::Worker { worker, source: e });
                    }
                }
            }
        }
        report.elapsed = timer.stop();

        if let Some(e) = spawn_error {
            return Err(RunError::Spawn(e));
        }
        if let Some(e) = first_failure {
            return Err(e);
        }

        info!(
            suite = %self.name,
            items = report.items,
            events = report.events,
            "run completed in {}ms",
            report.elapsed.as_millis()
        );
        Ok(report)
    }

    fn begin(&self) -> Result<(), RunError> {
        let mut state = self.state.lock();
        match *state {
            SuiteState::Running | SuiteState::Draining => Err(RunError::AlreadyRunning(*state)),
            SuiteState::NotStarted | SuiteState::Finished => {
                *state = SuiteState::Running;
                Ok(())
            }
        }
    }
}

impl fmt::Debug for ParallelSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelSuite")
            .field("name", &self.name)
            .field("items", &self.items.len())
            .field("workers", &self.workers)
            .field("state", &self.state())
            .finish()
    }
}
