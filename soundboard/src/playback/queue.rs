//! Playback queue
//!
//! Unbounded strict-FIFO queue shared by any number of producers and one
//! consumer thread. `push` never blocks; `pop` parks the consumer on a
//! condvar until work arrives or the queue is shut down.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

pub struct PlaybackQueue<T> {
    items: Mutex<VecDeque<T>>,
    condvar: Condvar,
    stop_flag: AtomicBool,
}

impl<T> Default for PlaybackQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PlaybackQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            stop_flag: AtomicBool::new(false),
        }
    }

    // A panicking producer cannot leave the deque in a broken state
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append to the tail and wake the consumer
    pub fn push(&self, item: T) {
        self.lock().push_back(item);
        self.condvar.notify_one();
    }

    /// Take the head, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue has been shut down.
    pub fn pop(&self) -> Option<T> {
        let mut items = self.lock();
        loop {
            if self.stop_flag.load(Ordering::Relaxed) {
                return None;
            }
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            items = self
                .condvar
                .wait(items)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Snapshot only: a producer may push right after this returns true
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Wake the consumer and make every later `pop` return `None`
    pub fn shutdown(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        // Take the lock so a consumer between its flag check and wait() can't miss the wakeup
        drop(self.lock());
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }
}
