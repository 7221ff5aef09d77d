//! Per-worker output buffering
//!
//! Every worker writes into its own in-memory buffer. Nothing reaches the
//! shared sink until the buffer is published, and a publish appends the
//! whole buffer in one piece, so output of two workers never interleaves.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

use super::SharedSink;
use crate::models::WorkerId;

type Buffer = Arc<Mutex<Vec<u8>>>;

struct Shared {
    sink: SharedSink,
    buffers: Mutex<BTreeMap<WorkerId, Buffer>>,
    error: AtomicBool,
}

/// Buffers output per worker in front of a shared sink
#[derive(Clone)]
pub struct OutputAggregator {
    shared: Arc<Shared>,
}

impl OutputAggregator {
    pub fn new(sink: SharedSink) -> Self {
        Self {
            shared: Arc::new(Shared {
                sink,
                buffers: Mutex::new(BTreeMap::new()),
                error: AtomicBool::new(false),
            }),
        }
    }

    /// Writer bound to `worker`'s buffer
    pub fn writer(&self, worker: WorkerId) -> WorkerOutput {
        WorkerOutput {
            worker,
            aggregator: self.clone(),
            buffer: None,
        }
    }

    /// Append everything `worker` wrote since its last publish to the sink,
    /// then empty the buffer. Publishing an empty buffer does nothing.
    ///
    /// An I/O failure sets the sticky error flag instead of being returned.
    pub fn publish(&self, worker: WorkerId) {
        let Some(buffer) = self.shared.buffers.lock().get(&worker).cloned() else {
            return;
        };

        // Hold the sink across take-and-write so no other publish can land
        // between them.
        let mut sink = self.shared.sink.lock();
        let bytes = std::mem::take(&mut *buffer.lock());
        if bytes.is_empty() {
            return;
        }

        trace!(%worker, bytes = bytes.len(), "publishing buffered output");
        if let Err(e) = sink.write_all(&bytes).and_then(|()| sink.flush()) {
            warn!(%worker, "failed to publish output: {}", e);
            self.shared.error.store(true, Ordering::SeqCst);
        }
    }

    /// Publish every worker's pending output, in worker order
    pub fn publish_all(&self) {
        let workers: Vec<WorkerId> = self.shared.buffers.lock().keys().copied().collect();
        for worker in workers {
            self.publish(worker);
        }
    }

    /// Bytes `worker` has written but not yet published
    pub fn pending(&self, worker: WorkerId) -> usize {
        self.shared
            .buffers
            .lock()
            .get(&worker)
            .map(|b| b.lock().len())
            .unwrap_or(0)
    }

    /// Whether any publish has failed so far
    pub fn check_error(&self) -> bool {
        self.shared.error.load(Ordering::SeqCst)
    }

    /// The underlying sink, for writing to it directly
    pub fn base(&self) -> SharedSink {
        self.shared.sink.clone()
    }

    fn buffer(&self, worker: WorkerId) -> Buffer {
        self.shared
            .buffers
            .lock()
            .entry(worker)
            .or_default()
            .clone()
    }
}

impl fmt::Debug for OutputAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputAggregator")
            .field("workers", &self.shared.buffers.lock().len())
            .field("error", &self.check_error())
            .finish()
    }
}

/// Buffered writer of one worker.
///
/// Clones write into the same buffer, so a clone handed to a thread the
/// worker spawns attributes that thread's output to the worker.
#[derive(Clone)]
pub struct WorkerOutput {
    worker: WorkerId,
    aggregator: OutputAggregator,
    buffer: Option<Buffer>,
}

impl WorkerOutput {
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Write one line
    pub fn println(&mut self, line: impl fmt::Display) {
        let buffer = self.buffer();
        let mut bytes = buffer.lock();
        // writing into a Vec cannot fail
        let _ = writeln!(bytes, "{line}");
    }

    /// Publish this worker's buffer to the shared sink
    pub fn publish(&self) {
        self.aggregator.publish(self.worker);
    }

    fn buffer(&mut self) -> &Buffer {
        self.buffer
            .get_or_insert_with(|| self.aggregator.buffer(self.worker))
    }
}

impl Write for WorkerOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer().lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    /// Output stays buffered until it is published
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for WorkerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerOutput")
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;
    use std::thread;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_is_held_until_publish() {
        let memory = MemorySink::new();
        let aggregator = OutputAggregator::new(memory.shared());
        let mut out = aggregator.writer(WorkerId::new(0));

        write!(out, "x = {}", 42).unwrap();
        out.println("");
        assert!(memory.is_empty());
        assert_eq!(aggregator.pending(WorkerId::new(0)), 7);

        out.publish();
        assert_eq!(memory.contents(), "x = 42\n");
        assert_eq!(aggregator.pending(WorkerId::new(0)), 0);
    }

    #[test]
    fn test_publish_twice_is_idempotent() {
        let memory = MemorySink::new();
        let aggregator = OutputAggregator::new(memory.shared());
        let mut out = aggregator.writer(WorkerId::new(1));

        out.println("once");
        aggregator.publish(WorkerId::new(1));
        aggregator.publish(WorkerId::new(1));

        assert_eq!(memory.contents(), "once\n");
    }

    #[test]
    fn test_unused_worker_publish_is_noop() {
        let memory = MemorySink::new();
        let aggregator = OutputAggregator::new(memory.shared());

        aggregator.publish(WorkerId::new(7));
        aggregator.publish_all();

        assert!(memory.is_empty());
        assert!(!aggregator.check_error());
    }

    #[test]
    fn test_buffers_are_independent() {
        let memory = MemorySink::new();
        let aggregator = OutputAggregator::new(memory.shared());
        let mut a = aggregator.writer(WorkerId::new(0));
        let mut b = aggregator.writer(WorkerId::new(1));

        a.println("a1");
        b.println("b1");
        a.println("a2");
        b.println("b2");

        b.publish();
        a.publish();
        assert_eq!(memory.contents(), "b1\nb2\na1\na2\n");
    }

    #[test]
    fn test_concurrent_publishes_stay_contiguous() {
        let memory = MemorySink::new();
        let aggregator = OutputAggregator::new(memory.shared());

        thread::scope(|scope| {
            for w in 0..4 {
                let mut out = aggregator.writer(WorkerId::new(w));
                scope.spawn(move || {
                    for round in 0..20 {
                        for line in 0..5 {
                            out.println(format!("w{w} r{round} l{line}"));
                        }
                        out.publish();
                    }
                });
            }
        });

        let contents = memory.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4 * 20 * 5);
        for block in lines.chunks(5) {
            let prefix = block[0].rsplit_once(' ').unwrap().0;
            for (i, line) in block.iter().enumerate() {
                assert_eq!(*line, format!("{prefix} l{i}"));
            }
        }
    }

    #[test]
    fn test_child_thread_shares_worker_buffer() {
        let memory = MemorySink::new();
        let aggregator = OutputAggregator::new(memory.shared());
        let mut out = aggregator.writer(WorkerId::new(0));

        out.println("parent");
        let mut child = out.clone();
        thread::spawn(move || child.println("child")).join().unwrap();
        assert!(memory.is_empty());

        out.publish();
        assert_eq!(memory.contents(), "parent\nchild\n");
    }

    #[test]
    fn test_publish_failure_is_sticky() {
        let aggregator = OutputAggregator::new(SharedSink::new(BrokenPipe));
        let mut out = aggregator.writer(WorkerId::new(0));

        out.println("lost");
        out.publish();
        assert!(aggregator.check_error());
        assert_eq!(aggregator.pending(WorkerId::new(0)), 0);

        // still set after a publish with nothing to write
        out.publish();
        assert!(aggregator.check_error());
    }

    #[test]
    fn test_base_sink_remains_usable() {
        let memory = MemorySink::new();
        let aggregator = OutputAggregator::new(memory.shared());
        let mut out = aggregator.writer(WorkerId::new(0));
        out.println("buffered");
        out.publish();

        let mut base = aggregator.base();
        drop(out);
        drop(aggregator);
        writeln!(base, "direct").unwrap();

        assert_eq!(memory.contents(), "buffered\ndirect\n");
    }
}
