//! Call recording and replay
//!
//! A [`CallLog`] accumulates calls against a capability set without executing
//! them. Later the whole sequence is replayed, in order, against a real
//! implementer. Replay stops at the first failing call.

/// A recorded call that can be executed against a target of type `T`
pub trait Replay<T: ?Sized> {
    type Error;

    fn replay_on(&self, target: &mut T) -> Result<(), Self::Error>;
}

/// Ordered log of recorded calls
#[derive(Clone, Debug, PartialEq)]
pub struct CallLog<C> {
    calls: Vec<C>,
}

impl<C> CallLog<C> {
    pub fn new() -> Self {
        Self { calls: Vec::new() }
    }

    /// Append a call to the log
    pub fn record(&mut self, call: C) {
        self.calls.push(call);
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn calls(&self) -> &[C] {
        &self.calls
    }

    /// Discard every recorded call
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Move the recorded calls into a new log, leaving this one empty
    pub fn take(&mut self) -> CallLog<C> {
        CallLog {
            calls: std::mem::take(&mut self.calls),
        }
    }

    /// Execute the recorded calls in order against `target`.
    ///
    /// The first error aborts the replay and is returned unchanged; calls after
    /// it are not executed. Returns the number of calls executed.
    pub fn replay<T>(&self, target: &mut T) -> Result<usize, C::Error>
    where
        T: ?Sized,
        C: Replay<T>,
    {
        for call in &self.calls {
            call.replay_on(target)?;
        }
        Ok(self.calls.len())
    }

    /// Replay against `target`, then clear the log whatever the outcome
    pub fn flush_into<T>(&mut self, target: &mut T) -> Result<usize, C::Error>
    where
        T: ?Sized,
        C: Replay<T>,
    {
        let result = self.replay(target);
        self.clear();
        result
    }
}

impl<C> Default for CallLog<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Extend<C> for CallLog<C> {
    fn extend<I: IntoIterator<Item = C>>(&mut self, iter: I) {
        self.calls.extend(iter);
    }
}

impl<C> IntoIterator for CallLog<C> {
    type Item = C;
    type IntoIter = std::vec::IntoIter<C>;

    fn into_iter(self) -> Self::IntoIter {
        self.calls.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum Op {
        Push(u32),
        Fail(&'static str),
    }

    impl Replay<Vec<u32>> for Op {
        type Error = String;

        fn replay_on(&self, target: &mut Vec<u32>) -> Result<(), String> {
            match self {
                Op::Push(v) => {
                    target.push(*v);
                    Ok(())
                }
                Op::Fail(msg) => Err(msg.to_string()),
            }
        }
    }

    #[test]
    fn test_record_does_not_execute() {
        let mut log = CallLog::new();
        log.record(Op::Push(1));
        log.record(Op::Fail("never run"));

        assert_eq!(log.len(), 2);
        assert_eq!(log.calls()[0], Op::Push(1));
    }

    #[test]
    fn test_replay_in_order() {
        let mut log = CallLog::new();
        log.extend([Op::Push(3), Op::Push(1), Op::Push(2)]);

        let mut target = Vec::new();
        assert_eq!(log.replay(&mut target), Ok(3));
        assert_eq!(target, vec![3, 1, 2]);
    }

    #[test]
    fn test_replay_stops_at_first_failure() {
        let mut log = CallLog::new();
        log.extend([
            Op::Push(1),
            Op::Push(2),
            Op::Fail("third call"),
            Op::Push(4),
            Op::Push(5),
        ]);

        let mut target = Vec::new();
        let result = log.flush_into(&mut target);

        assert_eq!(result, Err("third call".to_string()));
        assert_eq!(target, vec![1, 2]);
        assert!(log.is_empty());
    }

    #[test]
    fn test_flush_clears_after_success() {
        let mut log = CallLog::new();
        log.record(Op::Push(9));

        let mut target = Vec::new();
        assert_eq!(log.flush_into(&mut target), Ok(1));
        assert!(log.is_empty());

        // nothing left to deliver a second time
        assert_eq!(log.flush_into(&mut target), Ok(0));
        assert_eq!(target, vec![9]);
    }

    #[test]
    fn test_take_leaves_empty_log() {
        let mut log = CallLog::new();
        log.extend([Op::Push(1), Op::Push(2)]);

        let batch = log.take();
        assert!(log.is_empty());
        assert_eq!(batch.len(), 2);

        log.record(Op::Push(3));
        assert_eq!(batch.into_iter().collect::<Vec<_>>(), vec![Op::Push(1), Op::Push(2)]);
    }
}
