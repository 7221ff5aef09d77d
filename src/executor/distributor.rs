//! Work distribution
//!
//! Hands out items to workers one at a time and tracks how many workers are
//! still alive. Hand-offs are serialized by a second lock that is never held
//! together with the bookkeeping lock, so claims and exits never wait on an
//! observer call in flight.

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use super::SuiteState;
use crate::models::{ItemId, WorkItem};

#[derive(Debug)]
struct Bookkeeping {
    next: usize,
    live: usize,
}

/// Shared cursor over the items of one run
pub struct WorkDistributor<'s> {
    items: &'s [Box<dyn WorkItem>],
    state: &'s Mutex<SuiteState>,
    books: Mutex<Bookkeeping>,
    /// Hand-off section; counts the hand-offs entered
    handoffs: Mutex<usize>,
}

impl<'s> WorkDistributor<'s> {
    pub fn new(items: &'s [Box<dyn WorkItem>], workers: usize, state: &'s Mutex<SuiteState>) -> Self {
        Self {
            items,
            state,
            books: Mutex::new(Bookkeeping {
                next: 0,
                live: workers,
            }),
            handoffs: Mutex::new(0),
        }
    }

    /// Claim the next unclaimed item, or `None` once every item is taken
    pub fn claim_next(&self) -> Option<(ItemId, &'s dyn WorkItem)> {
        let mut books = self.books.lock();
        let index = books.next;
        let item = self.items.get(index)?;
        books.next += 1;
        Some((ItemId::new(index, item.name()), item.as_ref()))
    }

    /// Record that a worker has finished. Returns true for the last one,
    /// which moves the run into [`SuiteState::Draining`].
    pub fn worker_exited(&self) -> bool {
        self.abandon(1)
    }

    /// Remove `count` workers from the liveness count, e.g. workers that
    /// could not be spawned. Returns true if no worker is left.
    pub fn abandon(&self, count: usize) -> bool {
        let mut books = self.books.lock();
        if books.live == 0 {
            return false;
        }
        books.live = books.live.saturating_sub(count);
        if books.live > 0 {
            return false;
        }

        debug!(claimed = books.next, "last worker exited, draining");
        *self.state.lock() = SuiteState::Draining;
        true
    }

    /// Exclusive hand-off section, held until the guard is dropped
    pub fn handoff(&self) -> HandOff<'_> {
        let mut count = self.handoffs.lock();
        *count += 1;
        HandOff { _section: count }
    }

    pub fn claimed(&self) -> usize {
        self.books.lock().next
    }

    pub fn handoffs(&self) -> usize {
        *self.handoffs.lock()
    }

    pub fn live(&self) -> usize {
        self.books.lock().live
    }
}

/// Held for the duration of one hand-off
#[must_use = "the hand-off section ends when this guard is dropped"]
pub struct HandOff<'d> {
    _section: MutexGuard<'d, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FnItem, ItemContext};

    fn items(n: usize) -> Vec<Box<dyn WorkItem>> {
        (0..n)
            .map(|i| {
                Box::new(FnItem::new(format!("item {i}"), |_ctx: &mut ItemContext<'_>| Ok(())))
                    as Box<dyn WorkItem>
            })
            .collect()
    }

    #[test]
    fn test_claims_each_item_once() {
        let items = items(3);
        let state = Mutex::new(SuiteState::Running);
        let distributor = WorkDistributor::new(&items, 2, &state);

        let names: Vec<String> = std::iter::from_fn(|| distributor.claim_next())
            .map(|(id, item)| {
                assert_eq!(id.name, item.name());
                id.name
            })
            .collect();

        assert_eq!(names, vec!["item 0", "item 1", "item 2"]);
        assert!(distributor.claim_next().is_none());
        assert_eq!(distributor.claimed(), 3);
    }

    #[test]
    fn test_last_worker_drains() {
        let items = items(0);
        let state = Mutex::new(SuiteState::Running);
        let distributor = WorkDistributor::new(&items, 2, &state);

        assert!(!distributor.worker_exited());
        assert_eq!(*state.lock(), SuiteState::Running);
        assert!(distributor.worker_exited());
        assert_eq!(*state.lock(), SuiteState::Draining);

        // no second termination signal
        assert!(!distributor.worker_exited());
        assert_eq!(distributor.live(), 0);
    }

    #[test]
    fn test_abandon_unspawned_workers() {
        let items = items(1);
        let state = Mutex::new(SuiteState::Running);
        let distributor = WorkDistributor::new(&items, 4, &state);

        assert!(!distributor.abandon(3));
        assert_eq!(distributor.live(), 1);
        assert!(distributor.worker_exited());
    }

    #[test]
    fn test_handoff_counts() {
        let items = items(0);
        let state = Mutex::new(SuiteState::Running);
        let distributor = WorkDistributor::new(&items, 1, &state);

        drop(distributor.handoff());
        drop(distributor.handoff());
        assert_eq!(distributor.handoffs(), 2);
    }

    #[test]
    fn test_abandon_during_handoff() {
        let items = items(2);
        let state = Mutex::new(SuiteState::Running);
        let distributor = WorkDistributor::new(&items, 3, &state);

        // a worker stuck mid hand-off must not hold up claims or exits
        let _section = distributor.handoff();
        assert!(distributor.claim_next().is_some());
        assert!(!distributor.abandon(2));
        assert_eq!(distributor.live(), 1);
        assert!(distributor.worker_exited());
        assert_eq!(*state.lock(), SuiteState::Draining);
    }
}
