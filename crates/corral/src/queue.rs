//! Bounded FIFO of idle connections
//!
//! The queue hands entries directly to the oldest waiting popper, so
//! delivery order among blocked borrowers matches their arrival order.
//! Closing the queue wakes every waiter with a distinguished closed
//! outcome; the pool uses that both at shutdown and when it swaps the
//! queue out during a live resize.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{self, Duration};

/// Outcome of a blocking pop
#[derive(Debug)]
pub(crate) enum Pop<T> {
    /// An entry was delivered
    Item(T),
    /// The wait limit elapsed first
    TimedOut,
    /// The queue was closed while waiting (or before)
    Closed,
}

/// Outcome of a non-blocking pop
#[derive(Debug)]
pub(crate) enum TryPop<T> {
    /// An entry was available
    Item(T),
    /// Nothing queued right now
    Empty,
    /// The queue is closed and drained
    Closed,
}

/// Outcome of a push; rejected pushes give the entry back
#[derive(Debug)]
pub(crate) enum Push<T> {
    /// Stored at the queue tail
    Queued,
    /// Handed directly to a waiting popper
    Handed,
    /// The queue is at capacity
    Full(T),
    /// The queue is closed
    Closed(T),
}

struct Waiter<T> {
    id: u64,
    tx: oneshot::Sender<T>,
}

struct Inner<T> {
    items: VecDeque<T>,
    waiters: VecDeque<Waiter<T>>,
    closed: bool,
}

pub(crate) struct IdleQueue<T> {
    capacity: usize,
    next_waiter: AtomicU64,
    inner: Mutex<Inner<T>>,
}

impl<T> IdleQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_waiter: AtomicU64::new(0),
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                waiters: VecDeque::new(),
                closed: false,
            }),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Pop an entry, waiting up to `limit` (`None` waits indefinitely)
    pub(crate) async fn pop(&self, limit: Option<Duration>) -> Pop<T> {
        let (id, mut rx) = {
            let mut inner = self.inner.lock();
            if let Some(item) = inner.items.pop_front() {
                return Pop::Item(item);
            }
            if inner.closed {
                return Pop::Closed;
            }
            let id = self.next_waiter.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(Waiter { id, tx });
            (id, rx)
        };

        let received = match limit {
            Some(limit) => match time::timeout(limit, &mut rx).await {
                Ok(received) => received,
                Err(_elapsed) => return self.abandon(id, rx),
            },
            None => rx.await,
        };
        match received {
            Ok(item) => Pop::Item(item),
            // Sender dropped without a hand-off: the queue was closed.
            Err(_) => Pop::Closed,
        }
    }

    /// Resolve a timed-out wait.
    ///
    /// Hand-offs happen under the queue lock, so once we hold it the
    /// waiter entry is either still queued (nothing was sent, remove it)
    /// or gone (an entry was already sent into `rx` and must not be
    /// dropped).
    fn abandon(&self, id: u64, mut rx: oneshot::Receiver<T>) -> Pop<T> {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.waiters.iter().position(|w| w.id == id) {
            inner.waiters.remove(pos);
            return Pop::TimedOut;
        }
        drop(inner);
        match rx.try_recv() {
            Ok(item) => Pop::Item(item),
            Err(_) => Pop::Closed,
        }
    }

    /// Pop without waiting
    pub(crate) fn try_pop(&self) -> TryPop<T> {
        let mut inner = self.inner.lock();
        if let Some(item) = inner.items.pop_front() {
            return TryPop::Item(item);
        }
        if inner.closed {
            TryPop::Closed
        } else {
            TryPop::Empty
        }
    }

    /// Push without waiting, preferring a direct hand-off to a waiter
    pub(crate) fn try_push(&self, item: T) -> Push<T> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Push::Closed(item);
        }
        let mut item = item;
        while let Some(waiter) = inner.waiters.pop_front() {
            match waiter.tx.send(item) {
                Ok(()) => return Push::Handed,
                // Receiver gone (cancelled or timed out); try the next waiter.
                Err(rejected) => item = rejected,
            }
        }
        if inner.items.len() < self.capacity {
            inner.items.push_back(item);
            Push::Queued
        } else {
            Push::Full(item)
        }
    }

    /// Close the queue, waking every waiter with the closed outcome
    ///
    /// Returns whatever was still queued so the caller can dispose of it.
    pub(crate) fn close(&self) -> Vec<T> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.waiters.clear();
        inner.items.drain(..).collect()
    }
}
