// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The cooperative per-partition worker loop, spec.md §4.12: one worker
//! owns N connections and round-robins operation drains across them,
//! never running more than `max_operations_per_drain` operations for one
//! connection before moving on, so no single busy connection can starve
//! the rest of its partition.

use netq_core::time::Timestamp;

use crate::operation::{Operation, OperationQueue};

/// What a worker needs from each connection it owns: a place to pull queued
/// operations from, a way to actually run them against that connection's
/// protocol state, and its next timer deadline for when the worker has
/// nothing left to do.
///
/// Kept as a trait rather than hard-wiring `connection::Connection` here so
/// this module only encodes the scheduling algorithm spec.md §4.12
/// describes; a caller's own connection wrapper (holding the `Connection`,
/// its `OperationQueue`, and its I/O handles) implements it.
pub trait ConnectionHandle {
    fn queue(&self) -> &OperationQueue;
    fn run(&mut self, ops: alloc::vec::Vec<Operation>);
    fn next_deadline(&self) -> Option<Timestamp>;
    /// the connection has nothing further to do, ever, and may be dropped.
    fn is_finished(&self) -> bool {
        false
    }
}

/// Owns a fixed partition of connections and drains their operation queues
/// cooperatively. The actual blocking-until-woken integration (condvar,
/// epoll, io_uring, ...) belongs to the caller's datapath/reactor; this type
/// only implements the scheduling decision spec.md §4.12 specifies: how
/// much work each ready connection gets per pass, and what the worker
/// should wait for when none are ready.
pub struct Worker<H: ConnectionHandle> {
    connections: alloc::vec::Vec<H>,
    max_operations_per_drain: usize,
}

impl<H: ConnectionHandle> Worker<H> {
    pub fn new(max_operations_per_drain: usize) -> Self {
        Self {
            connections: alloc::vec::Vec::new(),
            max_operations_per_drain,
        }
    }

    pub fn add_connection(&mut self, handle: H) {
        self.connections.push(handle);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Drops every connection that has reported itself finished.
    pub fn reap_finished(&mut self) {
        self.connections.retain(|c| !c.is_finished());
    }

    /// One cooperative pass: every connection with pending operations gets
    /// up to `max_operations_per_drain` of them run, in partition order.
    /// Returns whether any connection had work this pass.
    pub fn run_pass(&mut self) -> bool {
        let mut any_ran = false;
        for handle in &mut self.connections {
            let ops = handle.queue().drain(self.max_operations_per_drain);
            if !ops.is_empty() {
                any_ran = true;
                handle.run(ops);
            }
        }
        any_ran
    }

    /// Runs passes until no connection in the partition has any queued
    /// operations left, then reports the earliest deadline to wait on next
    /// (spec.md §4.12: "block on the event queue with the minimum of all
    /// connections' next timer deadlines").
    pub fn drain_to_idle(&mut self) -> Option<Timestamp> {
        while self.run_pass() {}
        self.next_wakeup()
    }

    pub fn next_wakeup(&self) -> Option<Timestamp> {
        self.connections.iter().filter_map(H::next_deadline).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    struct TestHandle {
        queue: OperationQueue,
        deadline: Option<Timestamp>,
        ran: alloc::vec::Vec<usize>,
        finished: bool,
    }

    impl TestHandle {
        fn new(deadline: Option<Timestamp>) -> Self {
            Self {
                queue: OperationQueue::new(),
                deadline,
                ran: alloc::vec::Vec::new(),
                finished: false,
            }
        }
    }

    impl ConnectionHandle for TestHandle {
        fn queue(&self) -> &OperationQueue {
            &self.queue
        }

        fn run(&mut self, ops: alloc::vec::Vec<Operation>) {
            self.ran.push(ops.len());
        }

        fn next_deadline(&self) -> Option<Timestamp> {
            self.deadline
        }

        fn is_finished(&self) -> bool {
            self.finished
        }
    }

    #[test]
    fn a_busy_connection_is_capped_at_max_operations_per_drain() {
        let mut worker = Worker::new(2);
        let handle = TestHandle::new(None);
        for _ in 0..5 {
            handle.queue.enqueue(Operation::FlushSend);
        }
        worker.add_connection(handle);

        assert!(worker.run_pass());
        assert_eq!(worker.connections[0].ran, alloc::vec![2]);
        assert_eq!(worker.connections[0].queue.len(), 3);
    }

    #[test]
    fn idle_connections_report_no_work_this_pass() {
        let mut worker: Worker<TestHandle> = Worker::new(4);
        worker.add_connection(TestHandle::new(None));
        assert!(!worker.run_pass());
    }

    #[test]
    fn next_wakeup_is_the_earliest_connection_deadline() {
        let mut worker = Worker::new(4);
        worker.add_connection(TestHandle::new(Some(Timestamp::from_duration(Duration::from_millis(500)))));
        worker.add_connection(TestHandle::new(Some(Timestamp::from_duration(Duration::from_millis(100)))));
        worker.add_connection(TestHandle::new(None));
        assert_eq!(worker.next_wakeup(), Some(Timestamp::from_duration(Duration::from_millis(100))));
    }

    #[test]
    fn reap_finished_drops_completed_connections() {
        let mut worker = Worker::new(4);
        let mut done = TestHandle::new(None);
        done.finished = true;
        worker.add_connection(done);
        worker.add_connection(TestHandle::new(None));
        worker.reap_finished();
        assert_eq!(worker.len(), 1);
    }
}
