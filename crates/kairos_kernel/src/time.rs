//! The simulation clock.
//!
//! [`SimTime`] is a femtosecond count from the start of the run. It is the
//! canonical unit every delay is scaled into before scheduling, and it never
//! decreases. Ordering within one instant is not part of the time value;
//! that is carried by the event queue's `(Region, seq)` keys.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub use kairos_common::duration::{FS_PER_MS, FS_PER_NS, FS_PER_PS, FS_PER_S, FS_PER_US};

/// A point in simulation time, in femtoseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimTime {
    /// Femtoseconds since the start of the run.
    pub fs: u64,
}

impl SimTime {
    /// Time zero.
    pub fn zero() -> Self {
        Self { fs: 0 }
    }

    /// Builds a time from femtoseconds.
    pub fn from_fs(fs: u64) -> Self {
        Self { fs }
    }

    /// Builds a time from picoseconds.
    pub fn from_ps(ps: u64) -> Self {
        Self { fs: ps * FS_PER_PS }
    }

    /// Builds a time from nanoseconds.
    pub fn from_ns(ns: u64) -> Self {
        Self { fs: ns * FS_PER_NS }
    }

    /// Builds a time from microseconds.
    pub fn from_us(us: u64) -> Self {
        Self { fs: us * FS_PER_US }
    }

    /// This time plus a delay in femtoseconds.
    pub fn plus_fs(self, delay_fs: u64) -> Self {
        Self {
            fs: self.fs + delay_fs,
        }
    }

    /// Moves the clock forward to `fs`.
    ///
    /// The clock is monotonic; moving backwards is a kernel bug.
    pub fn advance_to(self, fs: u64) -> Self {
        debug_assert!(fs >= self.fs, "clock moved backwards: {} -> {fs}", self.fs);
        Self { fs }
    }

    /// Truncating conversion to nanoseconds.
    pub fn to_ns(self) -> u64 {
        self.fs / FS_PER_NS
    }
}

impl Default for SimTime {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fs.cmp(&other.fs)
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fs = self.fs;
        let (scaled, unit) = if fs == 0 {
            (0, "fs")
        } else if fs % FS_PER_MS == 0 {
            (fs / FS_PER_MS, "ms")
        } else if fs % FS_PER_US == 0 {
            (fs / FS_PER_US, "us")
        } else if fs % FS_PER_NS == 0 {
            (fs / FS_PER_NS, "ns")
        } else if fs % FS_PER_PS == 0 {
            (fs / FS_PER_PS, "ps")
        } else {
            (fs, "fs")
        };
        write!(f, "{scaled} {unit}")
    }
}
