//! Counting semaphore with FIFO-fair blocking acquires.

use std::collections::VecDeque;

use crate::ids::ProcessId;

/// A counting semaphore.
///
/// Blocked requesters queue in arrival order and are granted strictly from
/// the front: a later request for fewer resources never jumps ahead of an
/// earlier request for more, so large requesters cannot starve. Releasing
/// more than was ever acquired is permitted (the reference semantics have no
/// hard ceiling); the kernel's strict mode flags it as a likely bug.
pub struct Semaphore {
    initial: u32,
    available: u32,
    waiters: VecDeque<(ProcessId, u32)>,
}

impl Semaphore {
    /// Creates a semaphore holding `initial` resources.
    pub fn new(initial: u32) -> Self {
        Self {
            initial,
            available: initial,
            waiters: VecDeque::new(),
        }
    }

    /// The resource count the semaphore started with.
    pub fn initial(&self) -> u32 {
        self.initial
    }

    /// Resources currently available.
    pub fn available(&self) -> u32 {
        self.available
    }

    /// Number of blocked requesters.
    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Non-blocking acquire: takes `count` resources if they are available
    /// right now, returning the granted amount (0 on failure, no state
    /// change).
    pub fn try_get(&mut self, count: u32) -> u32 {
        if self.available >= count {
            self.available -= count;
            count
        } else {
            0
        }
    }

    /// Whether a blocking acquire of `count` can complete immediately:
    /// resources must be available and nobody may already be queued ahead.
    pub(crate) fn can_acquire_now(&self, count: u32) -> bool {
        self.waiters.is_empty() && self.available >= count
    }

    /// Takes `count` resources for an immediate blocking acquire.
    pub(crate) fn take(&mut self, count: u32) {
        debug_assert!(self.available >= count);
        self.available -= count;
    }

    /// Queues a blocked requester behind everyone already waiting.
    pub(crate) fn enqueue(&mut self, process: ProcessId, count: u32) {
        self.waiters.push_back((process, count));
    }

    /// Returns `count` resources and grants queued requesters from the
    /// front while the head request fits. The returned grants are in queue
    /// order; the caller wakes each granted process.
    pub fn release(&mut self, count: u32) -> Vec<(ProcessId, u32)> {
        self.available += count;
        let mut granted = Vec::new();
        while let Some(&(process, wanted)) = self.waiters.front() {
            if wanted > self.available {
                break;
            }
            self.available -= wanted;
            self.waiters.pop_front();
            granted.push((process, wanted));
        }
        granted
    }
}
