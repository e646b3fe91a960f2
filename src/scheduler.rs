//! Deferred state mutations.
//!
//! The real printer acknowledges a command immediately and applies it a
//! couple of seconds later. [`Scheduler::schedule`] stamps each mutation with
//! a deadline on the tokio clock; a single task owns the pending queue and
//! applies mutations in deadline order, ties broken by scheduling order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::printer::{PrintStatus, Printer};
use crate::thermal::Heater;

/// A state change applied once its latency has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    SetStatus(PrintStatus),
    SetTarget(Heater, i32),
}

impl Mutation {
    pub async fn apply(self, printer: &Printer) {
        match self {
            Mutation::SetStatus(status) => printer.set_status(status).await,
            Mutation::SetTarget(heater, temperature) => printer.set_target(heater, temperature).await,
        }
    }
}

#[derive(Debug)]
struct Pending {
    deadline: Instant,
    mutation: Mutation,
}

#[derive(Debug)]
struct Queued {
    deadline: Instant,
    sequence: u64,
    mutation: Mutation,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}
impl Eq for Queued {}
impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Min-heap of mutations keyed by `(deadline, sequence)`.
#[derive(Debug, Default)]
struct DelayQueue {
    heap: BinaryHeap<Reverse<Queued>>,
    next_sequence: u64,
}

impl DelayQueue {
    fn push(&mut self, pending: Pending) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse(Queued {
            deadline: pending.deadline,
            sequence,
            mutation: pending.mutation,
        }));
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(queued)| queued.deadline)
    }

    fn pop_due(&mut self, now: Instant) -> Option<Mutation> {
        match self.heap.peek() {
            Some(Reverse(queued)) if queued.deadline <= now => {
                self.heap.pop().map(|Reverse(queued)| queued.mutation)
            }
            _ => None,
        }
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Cloneable handle for scheduling mutations against one printer.
#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<Pending>,
    delay: Duration,
}

impl Scheduler {
    /// Start the scheduler task. It runs until every handle is dropped or
    /// the printer shuts down; mutations still pending then are discarded.
    pub fn spawn(printer: Printer, delay: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown_rx = printer.subscribe_shutdown();
        let handle = tokio::spawn(run(printer, rx, shutdown_rx));
        (Self { tx, delay }, handle)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Queue `mutation` to take effect after the command latency.
    pub fn schedule(&self, mutation: Mutation) {
        let deadline = Instant::now() + self.delay;
        tracing::debug!("Scheduling {:?} in {:?}", mutation, self.delay);
        if self.tx.send(Pending { deadline, mutation }).is_err() {
            tracing::warn!("Scheduler stopped, dropping {:?}", mutation);
        }
    }
}

async fn run(
    printer: Printer,
    mut rx: mpsc::UnboundedReceiver<Pending>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut queue = DelayQueue::default();
    loop {
        let next = queue.next_deadline();
        // Placeholder deadline for the disabled branch; never polled.
        let wake_at = next.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::debug!("Scheduler shutting down with {} pending", queue.len());
                break;
            }
            pending = rx.recv() => match pending {
                Some(pending) => queue.push(pending),
                None => {
                    tracing::debug!("All scheduler handles dropped, {} pending discarded", queue.len());
                    break;
                }
            },
            _ = tokio::time::sleep_until(wake_at), if next.is_some() => {
                let now = Instant::now();
                while let Some(mutation) = queue.pop_due(now) {
                    tracing::debug!("Applying {:?}", mutation);
                    mutation.apply(&printer).await;
                }
            }
        }
    }
}
