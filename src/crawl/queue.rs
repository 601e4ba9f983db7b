// src/crawl/queue.rs
// =============================================================================
// The crawl frontier: directories waiting to be listed.
//
// Workers share one queue. pop() hands out the oldest item (FIFO), or waits
// while other workers are still busy (they may push new directories), or
// returns None once the queue is empty and nobody is busy. That last case is
// how the crawl finishes; no sentinel message is needed.
//
// Bookkeeping:
// - items: pending FrontierItems, in insertion order
// - in_flight: items handed out by pop() and not yet complete()d
// - cancelled: once set, pop() returns None and push() drops items
// =============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;
use url::Url;

/// A directory waiting to be listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierItem {
    pub url: Url,
    /// Directory hops from the seed (seed = 0)
    pub depth: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<FrontierItem>,
    in_flight: usize,
}

#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<QueueState>,
    notify: Notify,
    cancelled: AtomicBool,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: FrontierItem) {
        if self.is_cancelled() {
            return;
        }
        self.lock().items.push_back(item);
        self.notify.notify_one();
    }

    /// Next item, or None when the crawl is finished or cancelled.
    /// Every Some must be paired with a later complete().
    pub async fn pop(&self) -> Option<FrontierItem> {
        loop {
            // Register before looking at the state so a wake-up between the
            // check and the await is not lost
            let notified = self.notify.notified();

            {
                if self.is_cancelled() {
                    return None;
                }
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    state.in_flight += 1;
                    return Some(item);
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks one popped item as done
    pub fn complete(&self) {
        let finished = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.in_flight == 0 && state.items.is_empty()
        };
        if finished {
            self.notify.notify_waiters();
        }
    }

    /// Stops handing out work. Items already popped finish normally.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why a queue instead of recursion?
//    - Directory trees can be deep; an explicit queue keeps memory flat
//    - Several workers can pull from one queue, recursion can't be shared
//    - Nothing about a directory is kept once it has been listed
//
// 2. Why std::sync::Mutex in async code?
//    - The lock is only held for a push or pop, never across an .await
//    - tokio::sync::Notify does the waiting part
//
// 3. Why does pop() wait instead of returning None on an empty queue?
//    - Another worker may be listing a directory right now and is about to
//      push its subdirectories. Only "empty AND nobody busy" means done.
// -----------------------------------------------------------------------------
