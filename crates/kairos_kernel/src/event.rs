//! The region-partitioned event queue.
//!
//! Every pending piece of work is a [`SimEvent`] ordered by
//! `(time, region, seq)`. Regions fix the phase structure of one instant:
//! Active work drains first, then Inactive (`#0` deferrals), then the NBA
//! applies. `seq` is a queue-assigned tie-breaker that preserves insertion
//! order among events with the same time and region, which is what gives
//! nonblocking assignments their last-write-wins determinism.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use kairos_common::LogicVec;
use serde::{Deserialize, Serialize};

use crate::ids::{ProcessId, SignalId};
use crate::process::Wake;
use crate::time::SimTime;

/// The scheduling phase of one simulation instant.
///
/// Declaration order is drain order within the instant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Region {
    /// Process resumptions and immediate updates.
    Active,
    /// Zero-delay deferrals; promoted once Active is empty.
    Inactive,
    /// Nonblocking-assignment applies; all committed together.
    Nba,
}

/// The work an event carries.
pub enum Action {
    /// Resume a process with the given wake payload.
    Resume {
        /// The process to run.
        process: ProcessId,
        /// Why it is being resumed.
        wake: Wake,
    },
    /// Commit a value to a signal and wake its dependents. Used for external
    /// stimulus and delayed blocking-style updates.
    Update {
        /// The target signal.
        signal: SignalId,
        /// The value to commit.
        value: LogicVec,
    },
    /// A deferred nonblocking apply; only popped inside the NBA phase.
    NbaUpdate {
        /// The target signal.
        signal: SignalId,
        /// The value captured when the write executed.
        value: LogicVec,
    },
}

/// One scheduled event.
pub struct SimEvent {
    /// When it fires.
    pub time: SimTime,
    /// Which phase of that instant it belongs to.
    pub region: Region,
    /// Insertion-order tie-breaker within `(time, region)`.
    pub seq: u64,
    /// The work to perform.
    pub action: Action,
}

impl SimEvent {
    fn key(&self) -> (SimTime, Region, u64) {
        (self.time, self.region, self.seq)
    }
}

impl PartialEq for SimEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for SimEvent {}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Time-ordered storage of pending events.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<SimEvent>>,
    next_seq: u64,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an event, assigning it the next sequence number.
    pub fn schedule(&mut self, time: SimTime, region: Region, action: Action) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(SimEvent {
            time,
            region,
            seq,
            action,
        }));
        seq
    }

    /// The earliest scheduled time, across all regions.
    pub fn peek_next_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|Reverse(ev)| ev.time)
    }

    /// Removes and returns every event at exactly `(time, region)`, in
    /// sequence order.
    ///
    /// Events scheduled while a batch executes land back in the heap and are
    /// picked up by the next call, so region drains are fixpoint iterations
    /// rather than single passes.
    pub fn pop_batch(&mut self, time: SimTime, region: Region) -> Vec<SimEvent> {
        let mut batch = Vec::new();
        while let Some(Reverse(ev)) = self.heap.peek() {
            if ev.time == time && ev.region == region {
                batch.push(self.heap.pop().expect("peeked event vanished").0);
            } else {
                break;
            }
        }
        batch
    }

    /// Returns `true` if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
