//! Observer capability set
//!
//! The events a suite reports about its items, the command form of those
//! events used for recording and replay, and stock observers.

mod reporter;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ObserverError;
use crate::models::{Failure, ItemId};
use crate::record::{CallLog, Replay};

pub use reporter::ConsoleReporter;

/// Receives item events.
///
/// During a suite run the observer is only ever called from the thread that
/// invoked the run, one item at a time: start, any failures, finish.
pub trait Observer {
    fn on_start(&mut self, item: &ItemId) -> Result<(), ObserverError>;

    fn on_finish(&mut self, item: &ItemId) -> Result<(), ObserverError>;

    /// The item raised something other than an assertion failure
    fn on_error(&mut self, item: &ItemId, failure: &Failure) -> Result<(), ObserverError>;

    fn on_failed_assertion(&mut self, item: &ItemId, failure: &Failure)
        -> Result<(), ObserverError>;
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn on_start(&mut self, item: &ItemId) -> Result<(), ObserverError> {
        (**self).on_start(item)
    }

    fn on_finish(&mut self, item: &ItemId) -> Result<(), ObserverError> {
        (**self).on_finish(item)
    }

    fn on_error(&mut self, item: &ItemId, failure: &Failure) -> Result<(), ObserverError> {
        (**self).on_error(item, failure)
    }

    fn on_failed_assertion(
        &mut self,
        item: &ItemId,
        failure: &Failure,
    ) -> Result<(), ObserverError> {
        (**self).on_failed_assertion(item, failure)
    }
}

impl<O: Observer + ?Sized> Observer for Box<O> {
    fn on_start(&mut self, item: &ItemId) -> Result<(), ObserverError> {
        (**self).on_start(item)
    }

    fn on_finish(&mut self, item: &ItemId) -> Result<(), ObserverError> {
        (**self).on_finish(item)
    }

    fn on_error(&mut self, item: &ItemId, failure: &Failure) -> Result<(), ObserverError> {
        (**self).on_error(item, failure)
    }

    fn on_failed_assertion(
        &mut self,
        item: &ItemId,
        failure: &Failure,
    ) -> Result<(), ObserverError> {
        (**self).on_failed_assertion(item, failure)
    }
}

/// One observer call with its arguments
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ObserverCall {
    Start { item: ItemId },
    Finish { item: ItemId },
    Error { item: ItemId, failure: Failure },
    FailedAssertion { item: ItemId, failure: Failure },
}

impl ObserverCall {
    pub fn item(&self) -> &ItemId {
        match self {
            ObserverCall::Start { item }
            | ObserverCall::Finish { item }
            | ObserverCall::Error { item, .. }
            | ObserverCall::FailedAssertion { item, .. } => item,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ObserverCall::Error { .. } | ObserverCall::FailedAssertion { .. }
        )
    }
}

impl<O: Observer + ?Sized> Replay<O> for ObserverCall {
    type Error = ObserverError;

    fn replay_on(&self, target: &mut O) -> Result<(), ObserverError> {
        match self {
            ObserverCall::Start { item } => target.on_start(item),
            ObserverCall::Finish { item } => target.on_finish(item),
            ObserverCall::Error { item, failure } => target.on_error(item, failure),
            ObserverCall::FailedAssertion { item, failure } => {
                target.on_failed_assertion(item, failure)
            }
        }
    }
}

impl fmt::Display for ObserverCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverCall::Start { item } => write!(f, "start {item}"),
            ObserverCall::Finish { item } => write!(f, "finish {item}"),
            ObserverCall::Error { item, failure } => write!(f, "error {item} ({failure})"),
            ObserverCall::FailedAssertion { item, failure } => {
                write!(f, "failed assertion {item} ({failure})")
            }
        }
    }
}

/// Observer proxy that records every call instead of executing it
#[derive(Debug, Default)]
pub struct RecordingObserver {
    log: CallLog<ObserverCall>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, call: ObserverCall) {
        self.log.record(call);
    }

    pub fn log(&self) -> &CallLog<ObserverCall> {
        &self.log
    }

    /// Move the recorded calls out, leaving the recorder empty
    pub fn take(&mut self) -> CallLog<ObserverCall> {
        self.log.take()
    }

    pub fn clear(&mut self) {
        self.log.clear();
    }
}

impl Observer for RecordingObserver {
    fn on_start(&mut self, item: &ItemId) -> Result<(), ObserverError> {
        self.record(ObserverCall::Start { item: item.clone() });
        Ok(())
    }

    fn on_finish(&mut self, item: &ItemId) -> Result<(), ObserverError> {
        self.record(ObserverCall::Finish { item: item.clone() });
        Ok(())
    }

    fn on_error(&mut self, item: &ItemId, failure: &Failure) -> Result<(), ObserverError> {
        self.record(ObserverCall::Error {
            item: item.clone(),
            failure: failure.clone(),
        });
        Ok(())
    }

    fn on_failed_assertion(
        &mut self,
        item: &ItemId,
        failure: &Failure,
    ) -> Result<(), ObserverError> {
        self.record(ObserverCall::FailedAssertion {
            item: item.clone(),
            failure: failure.clone(),
        });
        Ok(())
    }
}

/// Observer that keeps every event it receives, in order
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<ObserverCall>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ObserverCall] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ObserverCall> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of error and failed-assertion events
    pub fn failure_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_failure()).count()
    }
}

impl Observer for EventLog {
    fn on_start(&mut self, item: &ItemId) -> Result<(), ObserverError> {
        self.events.push(ObserverCall::Start { item: item.clone() });
        Ok(())
    }

    fn on_finish(&mut self, item: &ItemId) -> Result<(), ObserverError> {
        self.events.push(ObserverCall::Finish { item: item.clone() });
        Ok(())
    }

    fn on_error(&mut self, item: &ItemId, failure: &Failure) -> Result<(), ObserverError> {
        self.events.push(ObserverCall::Error {
            item: item.clone(),
            failure: failure.clone(),
        });
        Ok(())
    }

    fn on_failed_assertion(
        &mut self,
        item: &ItemId,
        failure: &Failure,
    ) -> Result<(), ObserverError> {
        self.events.push(ObserverCall::FailedAssertion {
            item: item.clone(),
            failure: failure.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Accepts `limit` events, then rejects everything
    struct Grumpy {
        seen: EventLog,
        limit: usize,
    }

    impl Grumpy {
        fn check(&self, item: &ItemId) -> Result<(), ObserverError> {
            if self.seen.len() >= self.limit {
                return Err(ObserverError::rejected(item, "event limit reached"));
            }
            Ok(())
        }
    }

    impl Observer for Grumpy {
        fn on_start(&mut self, item: &ItemId) -> Result<(), ObserverError> {
            self.check(item)?;
            self.seen.on_start(item)
        }

        fn on_finish(&mut self, item: &ItemId) -> Result<(), ObserverError> {
            self.check(item)?;
            self.seen.on_finish(item)
        }

        fn on_error(&mut self, item: &ItemId, failure: &Failure) -> Result<(), ObserverError> {
            self.check(item)?;
            self.seen.on_error(item, failure)
        }

        fn on_failed_assertion(
            &mut self,
            item: &ItemId,
            failure: &Failure,
        ) -> Result<(), ObserverError> {
            self.check(item)?;
            self.seen.on_failed_assertion(item, failure)
        }
    }

    fn record_item(recorder: &mut RecordingObserver, item: &ItemId, failure: Option<Failure>) {
        recorder.on_start(item).unwrap();
        if let Some(failure) = failure {
            recorder.on_failed_assertion(item, &failure).unwrap();
        }
        recorder.on_finish(item).unwrap();
    }

    #[test]
    fn test_recording_then_replay() {
        let a = ItemId::new(0, "a");
        let mut recorder = RecordingObserver::new();
        record_item(&mut recorder, &a, Some(Failure::assertion("off by one")));

        let mut log = EventLog::new();
        let batch = recorder.take();
        assert!(recorder.log().is_empty());
        assert_eq!(batch.replay(&mut log).unwrap(), 3);

        assert_eq!(
            log.into_events(),
            vec![
                ObserverCall::Start { item: a.clone() },
                ObserverCall::FailedAssertion {
                    item: a.clone(),
                    failure: Failure::assertion("off by one"),
                },
                ObserverCall::Finish { item: a },
            ]
        );
    }

    #[test]
    fn test_replay_aborts_on_observer_error() {
        let a = ItemId::new(0, "a");
        let b = ItemId::new(1, "b");
        let mut recorder = RecordingObserver::new();
        record_item(&mut recorder, &a, None);
        record_item(&mut recorder, &b, None);

        let mut observer = Grumpy {
            seen: EventLog::new(),
            limit: 3,
        };
        let mut batch = recorder.take();
        let err = batch.flush_into(&mut observer).unwrap_err();

        assert!(matches!(err, ObserverError::Rejected { .. }));
        assert_eq!(observer.seen.len(), 3);
        assert_eq!(observer.seen.events()[2], ObserverCall::Start { item: b });
        assert!(batch.is_empty());
    }

    #[test]
    fn test_observer_call_accessors() {
        let a = ItemId::new(2, "c");
        let call = ObserverCall::Error {
            item: a.clone(),
            failure: Failure::panic("index out of bounds"),
        };
        assert_eq!(call.item(), &a);
        assert!(call.is_failure());
        assert_eq!(
            call.to_string(),
            "error Item 3: c (panic: index out of bounds)"
        );
        assert!(!ObserverCall::Finish { item: a }.is_failure());
    }

    #[test]
    fn test_event_log_through_mut_ref() {
        fn report<O: Observer>(mut observer: O) {
            let x = ItemId::new(0, "x");
            observer.on_start(&x).unwrap();
            observer.on_error(&x, &Failure::error("oops")).unwrap();
        }

        let mut log = EventLog::new();
        report(&mut log);
        report(Box::new(EventLog::new()));

        assert_eq!(log.len(), 2);
        assert_eq!(log.failure_count(), 1);
    }
}
