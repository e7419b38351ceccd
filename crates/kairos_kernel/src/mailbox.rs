//! Bounded FIFO mailbox carrying dynamically typed messages.

use std::any::Any;
use std::collections::VecDeque;

use crate::error::KernelError;
use crate::ids::ProcessId;

/// What the mailbox owes its waiters after a state change.
///
/// Produced by [`Mailbox::balance`]; the scheduler turns deliveries into
/// `MailboxMessage` wakes and acceptances into `MailboxAccepted` wakes.
#[derive(Default)]
pub(crate) struct MailboxWakes {
    /// Blocked getters paired with the messages they receive, in FIFO order.
    pub deliveries: Vec<(ProcessId, Box<dyn Any>)>,
    /// Blocked putters whose messages were accepted, in FIFO order.
    pub accepted: Vec<ProcessId>,
}

/// A FIFO message queue with an optional capacity bound.
///
/// A bound of 0 means unbounded: puts never block. Otherwise the queue never
/// holds more than `bound` messages; excess puts queue up behind it.
/// Messages are `Box<dyn Any>`, so one mailbox can carry any shape; typed
/// receives check the shape and report a mismatch without disturbing the
/// queue.
pub struct Mailbox {
    bound: usize,
    queue: VecDeque<Box<dyn Any>>,
    put_waiters: VecDeque<(ProcessId, Box<dyn Any>)>,
    get_waiters: VecDeque<ProcessId>,
}

impl Mailbox {
    /// Creates a mailbox. `bound` of 0 means unbounded.
    pub fn new(bound: usize) -> Self {
        Self {
            bound,
            queue: VecDeque::new(),
            put_waiters: VecDeque::new(),
            get_waiters: VecDeque::new(),
        }
    }

    /// The capacity bound (0 = unbounded).
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if no message is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn has_space(&self) -> bool {
        self.bound == 0 || self.queue.len() < self.bound
    }

    /// Non-blocking send. `None` means accepted; `Some(message)` hands the
    /// message back because the mailbox is full.
    pub fn try_put(&mut self, message: Box<dyn Any>) -> Option<Box<dyn Any>> {
        if self.has_space() {
            self.queue.push_back(message);
            None
        } else {
            Some(message)
        }
    }

    /// Non-blocking typed receive.
    ///
    /// `Ok(None)` when the queue is empty. When the front message is not a
    /// `T`, returns [`KernelError::MailboxTypeMismatch`] and leaves the
    /// message in place, so the caller's mistake stays local.
    pub fn try_get<T: 'static>(&mut self) -> Result<Option<Box<T>>, KernelError> {
        match self.queue.front() {
            None => Ok(None),
            Some(front) if front.is::<T>() => {
                let msg = self.queue.pop_front().expect("front message vanished");
                let typed = msg.downcast::<T>().expect("checked downcast failed");
                Ok(Some(typed))
            }
            Some(_) => Err(KernelError::MailboxTypeMismatch),
        }
    }

    /// Attempts an immediate blocking put; `None` means accepted.
    ///
    /// Unlike [`try_put`](Self::try_put) this is the path a suspending
    /// process takes, so the caller must run [`balance`](Self::balance)
    /// afterwards to forward messages to blocked getters.
    pub(crate) fn put_or_enqueue(
        &mut self,
        process: ProcessId,
        message: Box<dyn Any>,
    ) -> bool {
        if let Some(message) = self.try_put(message) {
            self.put_waiters.push_back((process, message));
            false
        } else {
            true
        }
    }

    /// Pops a message for an immediate blocking get, if any.
    pub(crate) fn get_or_enqueue(&mut self, process: ProcessId) -> Option<Box<dyn Any>> {
        match self.queue.pop_front() {
            Some(msg) => Some(msg),
            None => {
                self.get_waiters.push_back(process);
                None
            }
        }
    }

    /// Moves the mailbox to a settled state: queued messages flow to blocked
    /// getters, then queued putters fill freed space. Returns the wakes the
    /// scheduler owes. Repeated until neither side can make progress, so
    /// put-order always equals get-order.
    pub(crate) fn balance(&mut self) -> MailboxWakes {
        let mut wakes = MailboxWakes::default();
        loop {
            let mut moved = false;
            while !self.get_waiters.is_empty() && !self.queue.is_empty() {
                let getter = self.get_waiters.pop_front().expect("getter vanished");
                let msg = self.queue.pop_front().expect("message vanished");
                wakes.deliveries.push((getter, msg));
                moved = true;
            }
            while self.has_space() && !self.put_waiters.is_empty() {
                let (putter, msg) = self.put_waiters.pop_front().expect("putter vanished");
                self.queue.push_back(msg);
                wakes.accepted.push(putter);
                moved = true;
            }
            if !moved {
                break;
            }
        }
        wakes
    }
}
