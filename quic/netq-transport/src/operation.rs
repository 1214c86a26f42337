// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The per-connection operation queue, spec.md §4.12: a FIFO of records any
//! thread may enqueue under a dispatch lock, drained serially by exactly
//! one worker. This is what lets `connection::Connection` itself stay free
//! of internal locks — every mutation happens on the worker that owns it.

use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex},
};

use netq_core::time::Timestamp;

/// A completion slot for API calls that need to report a result back to
/// the caller synchronously, spec.md §4.12: "API calls that require
/// synchronous completion pair with a completion event and status slot".
#[derive(Debug)]
pub struct Completion<T> {
    inner: Arc<(Mutex<Option<T>>, Condvar)>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new((Mutex::new(None), Condvar::new())),
        }
    }
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the worker once the operation has run.
    pub fn complete(&self, value: T) {
        let (lock, condvar) = &*self.inner;
        let mut slot = lock.lock().unwrap();
        *slot = Some(value);
        condvar.notify_all();
    }

    /// Blocks the calling thread until `complete` is called.
    pub fn wait(&self) -> T {
        let (lock, condvar) = &*self.inner;
        let mut slot = lock.lock().unwrap();
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            slot = condvar.wait(slot).unwrap();
        }
    }
}

/// One record in a connection's operation queue. Spec.md §4.12's
/// enumeration: API call, flush-recv, flush-send, timer-expired,
/// stateless event, unreachable, route-completion.
pub enum Operation {
    /// an application call that mutates protocol state (open/write/close a
    /// stream, initiate a connection close, ...), carried as an opaque
    /// closure so callers don't need a variant per API method.
    ApiCall(Box<dyn FnOnce() + Send>),
    FlushRecv,
    FlushSend,
    TimerExpired,
    /// an ICMP-unreachable or similar stateless signal from the datapath.
    StatelessEvent,
    Unreachable,
    /// a previously-async route/path-validation lookup has completed.
    RouteCompletion,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::ApiCall(_) => "ApiCall",
            Operation::FlushRecv => "FlushRecv",
            Operation::FlushSend => "FlushSend",
            Operation::TimerExpired => "TimerExpired",
            Operation::StatelessEvent => "StatelessEvent",
            Operation::Unreachable => "Unreachable",
            Operation::RouteCompletion => "RouteCompletion",
        };
        f.write_str(name)
    }
}

/// A connection's FIFO of pending operations plus the dispatch lock that
/// lets any thread enqueue safely, spec.md §4.12.
#[derive(Debug, Default)]
pub struct OperationQueue {
    queue: Mutex<VecDeque<Operation>>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueues `op`, callable from any thread.
    pub fn enqueue(&self, op: Operation) {
        self.queue.lock().unwrap().push_back(op);
    }

    /// Drains up to `max` operations for the owning worker to run, leaving
    /// the rest queued. Spec.md §4.12's `MaxOperationsPerDrain` cap is
    /// enforced by the caller passing that as `max`.
    pub fn drain(&self, max: usize) -> Vec<Operation> {
        let mut queue = self.queue.lock().unwrap();
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

/// A connection's next wakeup, used by the worker to decide how long to
/// block when nothing is ready (spec.md §4.12's "block on the minimum of
/// all connections' next timer deadlines").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(pub Timestamp);

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::atomic::{AtomicUsize, Ordering}, thread};

    #[test]
    fn enqueue_and_drain_preserve_fifo_order() {
        let queue = OperationQueue::new();
        queue.enqueue(Operation::FlushRecv);
        queue.enqueue(Operation::FlushSend);
        queue.enqueue(Operation::TimerExpired);

        let drained = queue.drain(2);
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], Operation::FlushRecv));
        assert!(matches!(drained[1], Operation::FlushSend));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn enqueue_is_safe_from_multiple_threads() {
        let queue = Arc::new(OperationQueue::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..25 {
                    queue.enqueue(Operation::FlushSend);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(queue.len(), 100);
    }

    #[test]
    fn completion_wakes_a_waiting_thread_with_the_result() {
        let completion: Completion<u32> = Completion::new();
        let done = Arc::new(AtomicUsize::new(0));
        let worker_completion = completion.clone();
        let worker_done = done.clone();
        let handle = thread::spawn(move || {
            worker_completion.complete(42);
            worker_done.store(1, Ordering::SeqCst);
        });
        assert_eq!(completion.wait(), 42);
        handle.join().unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
