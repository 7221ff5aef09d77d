//! Cross-thread call marshalling
//!
//! Lets any thread synchronously invoke an operation on a target that only
//! the coordinating thread may touch. Callers go through a cloneable
//! [`MarshalHandle`]; the coordinator drains the call queue in
//! [`Marshaller::run`] until [`MarshalHandle::stop`] is called.
//!
//! Calls are executed strictly in the order they reach the queue, so calls
//! issued by one thread keep that thread's program order.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::error::MarshalError;

enum Envelope<T: ?Sized> {
    /// A call waiting for the coordinator. It owns its arguments and the
    /// reply slot, so executing it is all the coordinator has to do.
    Call(Box<dyn FnOnce(&mut T) + Send>),
    Stop,
}

/// Dispatch loop owned by the coordinating thread
pub struct Marshaller<T: ?Sized> {
    tx: mpsc::UnboundedSender<Envelope<T>>,
    rx: mpsc::UnboundedReceiver<Envelope<T>>,
}

impl<T: ?Sized + 'static> Marshaller<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Handle for threads that need to call into the target
    pub fn handle(&self) -> MarshalHandle<T> {
        MarshalHandle {
            tx: self.tx.clone(),
        }
    }

    /// Execute forwarded calls against `target` until the stop marker arrives.
    ///
    /// Must be called from the thread that owns `target`. Returns the number of
    /// calls executed. Calls queued behind the stop marker are discarded and
    /// their callers receive [`MarshalError::Dropped`]; later calls are refused
    /// with [`MarshalError::Stopped`].
    pub fn run(&mut self, target: &mut T) -> usize {
        let mut dispatched = 0;

        // The marshaller keeps a sender of its own, so the queue only ends
        // when it was closed by a previous run.
        while let Some(envelope) = self.rx.blocking_recv() {
            match envelope {
                Envelope::Call(call) => {
                    call(target);
                    dispatched += 1;
                }
                Envelope::Stop => {
                    debug!(dispatched, "dispatch loop received stop marker");
                    break;
                }
            }
        }

        self.rx.close();
        let mut discarded = 0;
        while let Ok(envelope) = self.rx.try_recv() {
            if matches!(envelope, Envelope::Call(_)) {
                discarded += 1;
            }
        }
        if discarded > 0 {
            debug!(discarded, "discarded calls queued after stop");
        }

        dispatched
    }
}

impl<T: ?Sized + 'static> Default for Marshaller<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller side of a [`Marshaller`]
pub struct MarshalHandle<T: ?Sized> {
    tx: mpsc::UnboundedSender<Envelope<T>>,
}

impl<T: ?Sized> Clone for MarshalHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: ?Sized + 'static> MarshalHandle<T> {
    /// Run `call` on the coordinator and block until it has completed.
    ///
    /// The value produced by `call` is returned as is, so a target returning
    /// `Result<_, E>` hands its own `E` back to the caller. A panic inside
    /// `call` is resumed on the calling thread with its original payload.
    ///
    /// Must not be called from the coordinating thread itself: nothing would
    /// be left to drain the queue.
    pub fn forward<R, F>(&self, call: F) -> Result<R, MarshalError>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel::<thread::Result<R>>();

        let pending: Box<dyn FnOnce(&mut T) + Send> = Box::new(move |target: &mut T| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| call(target)));
            // The caller blocks on the reply until it arrives, so a failed
            // send means the caller thread is already gone.
            let _ = reply_tx.send(outcome);
        });

        self.tx
            .send(Envelope::Call(pending))
            .map_err(|_| MarshalError::Stopped)?;
        trace!("forwarded call to dispatch loop");

        match reply_rx.blocking_recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => Err(MarshalError::Dropped),
        }
    }

    /// Ask the dispatch loop to return once every call queued so far ran
    pub fn stop(&self) {
        if self.tx.send(Envelope::Stop).is_err() {
            debug!("stop requested after dispatch loop closed");
        }
    }

    /// Whether the dispatch loop has shut down for good
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct Overdrawn(u64);

    #[derive(Default)]
    struct Account {
        balance: u64,
        history: Vec<(usize, u64)>,
    }

    impl Account {
        fn withdraw(&mut self, amount: u64) -> Result<u64, Overdrawn> {
            if amount > self.balance {
                return Err(Overdrawn(self.balance));
            }
            self.balance -= amount;
            Ok(self.balance)
        }
    }

    #[test]
    fn test_forward_returns_target_result() {
        let mut marshaller: Marshaller<Account> = Marshaller::new();
        let handle = marshaller.handle();

        let caller = thread::spawn(move || {
            let ok = handle.forward(|acct: &mut Account| acct.withdraw(30));
            let err = handle.forward(|acct: &mut Account| acct.withdraw(500));
            handle.stop();
            (ok, err)
        });

        let mut account = Account {
            balance: 100,
            ..Default::default()
        };
        let dispatched = marshaller.run(&mut account);
        let (ok, err) = caller.join().unwrap();

        assert_eq!(dispatched, 2);
        assert_eq!(ok, Ok(Ok(70)));
        assert_eq!(err, Ok(Err(Overdrawn(70))));
        assert_eq!(account.balance, 70);
    }

    #[test]
    fn test_calls_run_on_coordinator_thread() {
        let mut marshaller: Marshaller<Vec<thread::ThreadId>> = Marshaller::new();
        let handle = marshaller.handle();

        let caller = thread::spawn(move || {
            handle
                .forward(|seen: &mut Vec<thread::ThreadId>| seen.push(thread::current().id()))
                .unwrap();
            handle.stop();
            thread::current().id()
        });

        let mut seen = Vec::new();
        marshaller.run(&mut seen);
        let caller_id = caller.join().unwrap();

        assert_eq!(seen, vec![thread::current().id()]);
        assert_ne!(seen[0], caller_id);
    }

    #[test]
    fn test_per_thread_order_is_preserved() {
        let mut marshaller: Marshaller<Account> = Marshaller::new();
        let remaining = Arc::new(std::sync::atomic::AtomicUsize::new(3));

        let callers: Vec<_> = (0..3)
            .map(|t| {
                let handle = marshaller.handle();
                let remaining = remaining.clone();
                thread::spawn(move || {
                    for seq in 0..50u64 {
                        handle
                            .forward(move |acct: &mut Account| acct.history.push((t, seq)))
                            .unwrap();
                    }
                    if remaining.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) == 1 {
                        handle.stop();
                    }
                })
            })
            .collect();

        let mut account = Account::default();
        let dispatched = marshaller.run(&mut account);
        for caller in callers {
            caller.join().unwrap();
        }

        assert_eq!(dispatched, 150);
        for t in 0..3 {
            let seqs: Vec<u64> = account
                .history
                .iter()
                .filter(|(thread, _)| *thread == t)
                .map(|(_, seq)| *seq)
                .collect();
            assert_eq!(seqs, (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_panic_is_resumed_on_caller() {
        let mut marshaller: Marshaller<Account> = Marshaller::new();
        let handle = marshaller.handle();

        let caller = thread::spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                handle.forward(|_: &mut Account| -> u64 { panic!("ledger corrupted") })
            }));
            handle.stop();
            outcome
        });

        let mut account = Account::default();
        marshaller.run(&mut account);
        let payload = caller.join().unwrap().unwrap_err();

        assert_eq!(
            crate::error::panic_message(payload.as_ref()),
            "ledger corrupted"
        );
    }

    #[test]
    fn test_calls_behind_stop_are_dropped() {
        let mut marshaller: Marshaller<Account> = Marshaller::new();
        let handle = marshaller.handle();
        handle.stop();

        let late = marshaller.handle();
        let caller = thread::spawn(move || late.forward(|acct: &mut Account| acct.balance));
        while marshaller.rx.len() < 2 {
            thread::yield_now();
        }

        let mut account = Account::default();
        assert_eq!(marshaller.run(&mut account), 0);
        assert_eq!(caller.join().unwrap(), Err(MarshalError::Dropped));
    }

    #[test]
    fn test_forward_after_run_is_refused() {
        let mut marshaller: Marshaller<Account> = Marshaller::new();
        let handle = marshaller.handle();
        handle.stop();

        let mut account = Account::default();
        assert_eq!(marshaller.run(&mut account), 0);
        assert!(handle.is_closed());

        let result = handle.forward(|acct: &mut Account| acct.balance);
        assert_eq!(result, Err(MarshalError::Stopped));
    }
}
