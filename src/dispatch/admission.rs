//! Bounded admission with a FIFO overflow queue.
//!
//! # Responsibilities
//! - Admit up to `limit` concurrent units
//! - Park the overflow in arrival order and wake it as slots free up
//! - Pause, resume and cancel the queue
//!
//! # Design Decisions
//! - A slot is an RAII guard: dropping it frees capacity and drains the queue
//! - A waiter dropped after being granted a slot hands the slot back
//! - Lowering the limit never preempts running units; it only delays admissions

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::oneshot;

/// Why a submission never ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The dispatcher was cancelled or the run ended before the unit started.
    #[error("dispatcher closed")]
    Closed,
}

#[derive(Debug)]
struct Gate {
    limit: usize,
    active: usize,
    paused: bool,
    closed: bool,
    queue: VecDeque<oneshot::Sender<()>>,
}

impl Gate {
    fn has_capacity(&self) -> bool {
        !self.paused && !self.closed && self.active < self.limit
    }

    fn drain(&mut self) {
        while self.has_capacity() {
            let Some(waiter) = self.queue.pop_front() else {
                break;
            };
            // A failed send means the waiter gave up; its turn is skipped.
            if waiter.send(()).is_ok() {
                self.active += 1;
            }
        }
    }
}

/// Admission gate shared by every submission of one dispatcher.
#[derive(Debug)]
pub struct Admission {
    gate: Mutex<Gate>,
}

impl Admission {
    pub fn new(limit: usize) -> Self {
        Self {
            gate: Mutex::new(Gate {
                limit: limit.max(1),
                active: 0,
                paused: false,
                closed: false,
                queue: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().expect("admission mutex poisoned")
    }

    /// Wait for a slot. Resolves immediately when capacity is free and the
    /// gate is not paused; otherwise queues behind earlier submissions.
    pub async fn admit(&self) -> Result<Slot<'_>, DispatchError> {
        let receiver = {
            let mut gate = self.lock();
            if gate.closed {
                return Err(DispatchError::Closed);
            }
            gate.drain();
            if gate.has_capacity() && gate.queue.is_empty() {
                gate.active += 1;
                return Ok(Slot { admission: self });
            }
            let (tx, rx) = oneshot::channel();
            gate.queue.push_back(tx);
            rx
        };

        let mut ticket = Ticket {
            admission: self,
            receiver: Some(receiver),
        };
        let granted = match ticket.receiver.as_mut() {
            Some(receiver) => receiver.await.is_ok(),
            None => false,
        };
        ticket.receiver = None;

        if granted {
            Ok(Slot { admission: self })
        } else {
            Err(DispatchError::Closed)
        }
    }

    fn release(&self) {
        let mut gate = self.lock();
        gate.active = gate.active.saturating_sub(1);
        gate.drain();
    }

    /// Stop admitting. Submissions keep queueing. Idempotent.
    pub fn pause(&self) {
        self.lock().paused = true;
    }

    /// Resume admitting and drain the queue. Idempotent.
    pub fn resume(&self) {
        let mut gate = self.lock();
        gate.paused = false;
        gate.drain();
    }

    /// Close the gate and drop every queued submission. Running units are
    /// unaffected. Returns how many queued submissions were dropped.
    pub fn cancel(&self) -> usize {
        let mut gate = self.lock();
        gate.closed = true;
        let dropped = gate.queue.len();
        gate.queue.clear();
        dropped
    }

    /// Apply a new concurrency limit, admitting queued units if it grew.
    pub fn set_limit(&self, limit: usize) {
        let mut gate = self.lock();
        gate.limit = limit.max(1);
        gate.drain();
    }

    pub fn limit(&self) -> usize {
        self.lock().limit
    }

    pub fn active(&self) -> usize {
        self.lock().active
    }

    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// One occupied concurrency slot.
#[derive(Debug)]
pub struct Slot<'a> {
    admission: &'a Admission,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.admission.release();
    }
}

/// A queued submission. If it is dropped after the gate granted it a slot
/// but before the grant was observed, the slot is returned.
struct Ticket<'a> {
    admission: &'a Admission,
    receiver: Option<oneshot::Receiver<()>>,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
            if receiver.try_recv().is_ok() {
                self.admission.release();
            }
        }
    }
}
