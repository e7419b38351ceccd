//! Cooperative processes: suspension conditions, wake payloads, and the
//! resumable-body contract.
//!
//! A process is an explicit state machine. The kernel calls
//! [`ProcessBody::resume`] with a [`Wake`] describing why the process is
//! running; the body executes until it either completes the activation
//! ([`Step::Done`]) or reaches a suspension point and returns the
//! [`WaitCondition`] it is blocked on. There is no stack switching: whatever
//! state must survive a suspension lives in the body itself.

use std::any::Any;
use std::fmt;

use kairos_common::{Ident, LogicVec};

use crate::error::KernelError;
use crate::ids::{EventId, MailboxId, ProcessId, SemaphoreId, SignalId};
use crate::kernel::SchedState;
use crate::signal::{EdgeKind, SignalStore};
use crate::time::SimTime;

/// How a process is (re)started by the scheduler.
#[derive(Clone, Debug)]
pub enum Sensitivity {
    /// Run once when registered, then finish when the body completes.
    None,
    /// Re-run whenever any listed signal changes value. The first activation
    /// happens at registration time, for initial propagation.
    Signals(Vec<SignalId>),
    /// Re-run on matching edges of the listed signals. No initial
    /// activation; the first run waits for an edge.
    Edges(Vec<(SignalId, EdgeKind)>),
}

/// How a fork joins its children.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JoinMode {
    /// Block until every child finishes.
    All,
    /// Block until the first child finishes; the rest keep running detached.
    Any,
    /// Do not block; children run independently, owned by the process table.
    None,
}

/// A suspension point returned by a process body.
pub enum WaitCondition {
    /// Resume after a delay in femtoseconds. Zero means "later in this same
    /// instant": the resume lands in the Inactive region after the Active
    /// region drains.
    Delay(u64),
    /// Resume on a signal edge.
    Edge {
        /// The watched signal.
        signal: SignalId,
        /// The transition kind.
        edge: EdgeKind,
    },
    /// Resume when a predicate over current signal values becomes true.
    /// The predicate is evaluated at commit boundaries only, never while an
    /// update batch is partially applied.
    Level {
        /// Signals whose commits re-test the predicate.
        watch: Vec<SignalId>,
        /// The predicate. Must read only declared signals.
        predicate: Box<dyn Fn(&SignalStore) -> bool>,
    },
    /// Resume when the named event triggers (or already triggered in this
    /// same instant).
    Event(EventId),
    /// Resume once `count` resources have been acquired, FIFO among blocked
    /// requesters.
    SemAcquire {
        /// The semaphore.
        sem: SemaphoreId,
        /// How many resources to take.
        count: u32,
    },
    /// Resume once the message has been accepted into the mailbox.
    MailboxPut {
        /// The mailbox.
        mailbox: MailboxId,
        /// The message, surrendered to the kernel until accepted.
        message: Box<dyn Any>,
    },
    /// Resume with the next message from the mailbox.
    MailboxGet {
        /// The mailbox.
        mailbox: MailboxId,
    },
    /// Resume when forked children finish, per `mode`.
    Join {
        /// The children to join on.
        children: Vec<ProcessId>,
        /// The join policy.
        mode: JoinMode,
    },
}

impl fmt::Debug for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitCondition::Delay(fs) => write!(f, "Delay({fs})"),
            WaitCondition::Edge { signal, edge } => {
                write!(f, "Edge(signal #{}, {edge:?})", signal.as_raw())
            }
            WaitCondition::Level { watch, .. } => write!(f, "Level({} signals)", watch.len()),
            WaitCondition::Event(ev) => write!(f, "Event(#{})", ev.as_raw()),
            WaitCondition::SemAcquire { sem, count } => {
                write!(f, "SemAcquire(#{}, {count})", sem.as_raw())
            }
            WaitCondition::MailboxPut { mailbox, .. } => {
                write!(f, "MailboxPut(#{})", mailbox.as_raw())
            }
            WaitCondition::MailboxGet { mailbox } => {
                write!(f, "MailboxGet(#{})", mailbox.as_raw())
            }
            WaitCondition::Join { children, mode } => {
                write!(f, "Join({} children, {mode:?})", children.len())
            }
        }
    }
}

/// What a suspended process is blocked on; the lightweight tag kept in the
/// process table while the heavyweight registration (predicate, message,
/// waiter-queue entry) lives with its source.
#[derive(Debug)]
pub(crate) enum WaitKind {
    Delay,
    Edge(SignalId, EdgeKind),
    Level,
    Event(EventId),
    Semaphore(SemaphoreId, u32),
    MailboxPut(MailboxId),
    MailboxGet(MailboxId),
    Join {
        remaining: Vec<ProcessId>,
        mode: JoinMode,
    },
}

impl fmt::Display for WaitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitKind::Delay => write!(f, "a delay"),
            WaitKind::Edge(signal, edge) => {
                write!(f, "{edge:?} of signal #{}", signal.as_raw())
            }
            WaitKind::Level => write!(f, "a level condition"),
            WaitKind::Event(ev) => write!(f, "event #{}", ev.as_raw()),
            WaitKind::Semaphore(sem, count) => {
                write!(f, "{count} from semaphore #{}", sem.as_raw())
            }
            WaitKind::MailboxPut(mb) => write!(f, "space in mailbox #{}", mb.as_raw()),
            WaitKind::MailboxGet(mb) => write!(f, "a message from mailbox #{}", mb.as_raw()),
            WaitKind::Join { remaining, .. } => {
                write!(f, "join of {} child process(es)", remaining.len())
            }
        }
    }
}

/// The lifecycle state of a process.
#[derive(Debug)]
pub(crate) enum ProcessState {
    /// Scheduled to run; a resume event is in flight.
    Runnable,
    /// Blocked on a wait condition.
    Suspended(WaitKind),
    /// Between activations, waiting on the static sensitivity list.
    Armed,
    /// Ran to completion; never runs again.
    Finished,
}

/// A read-only view of a process's lifecycle, for embedders and tests.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcessStatus {
    /// Scheduled to run.
    Runnable,
    /// Blocked on a wait condition.
    Suspended,
    /// Waiting on its static sensitivity list.
    Armed,
    /// Ran to completion.
    Finished,
}

/// What a process body does at the end of one activation step.
pub enum Step {
    /// Suspend on the given condition; `resume` will be called again with
    /// the matching [`Wake`] when it is satisfied.
    Wait(WaitCondition),
    /// This activation is complete. A one-shot process finishes; a
    /// statically sensitive process re-arms and must be ready to run again
    /// from the top.
    Done,
}

/// Why a process is being resumed.
pub enum Wake {
    /// First run of an activation: registration, sensitivity trigger, or
    /// fork start.
    Activated,
    /// A `Delay` elapsed.
    DelayElapsed,
    /// The awaited edge occurred.
    Edge {
        /// The signal that moved.
        signal: SignalId,
        /// The matched edge kind.
        edge: EdgeKind,
    },
    /// The awaited level predicate became true.
    LevelMet,
    /// The awaited named event triggered.
    EventTriggered(EventId),
    /// The requested semaphore resources were granted.
    SemAcquired {
        /// How many resources were taken.
        count: u32,
    },
    /// A blocking mailbox get completed with this message.
    MailboxMessage(Box<dyn Any>),
    /// A blocking mailbox put was accepted.
    MailboxAccepted,
    /// The join condition was satisfied.
    Joined,
}

impl fmt::Debug for Wake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wake::Activated => write!(f, "Activated"),
            Wake::DelayElapsed => write!(f, "DelayElapsed"),
            Wake::Edge { signal, edge } => {
                write!(f, "Edge(signal #{}, {edge:?})", signal.as_raw())
            }
            Wake::LevelMet => write!(f, "LevelMet"),
            Wake::EventTriggered(ev) => write!(f, "EventTriggered(#{})", ev.as_raw()),
            Wake::SemAcquired { count } => write!(f, "SemAcquired({count})"),
            Wake::MailboxMessage(_) => write!(f, "MailboxMessage(..)"),
            Wake::MailboxAccepted => write!(f, "MailboxAccepted"),
            Wake::Joined => write!(f, "Joined"),
        }
    }
}

/// A resumable process body.
///
/// Implementations are state machines: `resume` runs from the last
/// suspension point to the next one. After returning [`Step::Done`], a
/// statically sensitive body must be prepared to start over from the top on
/// the next `Wake::Activated`.
pub trait ProcessBody {
    /// Runs until the next suspension point or completion.
    fn resume(&mut self, cx: &mut ProcCtx<'_>, wake: Wake) -> Result<Step, KernelError>;
}

/// One entry in the kernel's process table.
pub(crate) struct ProcessSlot {
    pub name: Ident,
    /// Taken out while the body runs, so the body can borrow the scheduler.
    pub body: Option<Box<dyn ProcessBody>>,
    pub state: ProcessState,
    pub sensitivity: Sensitivity,
    pub parent: Option<ProcessId>,
    /// Guards against double-scheduling a resume for the same process.
    pub pending_resume: bool,
}

/// The kernel services available to a running process.
///
/// Every mutation goes through the scheduler state, so blocking writes wake
/// their dependents immediately and nonblocking writes land in the NBA
/// region, exactly as if the embedding front end had compiled them.
pub struct ProcCtx<'a> {
    pub(crate) pid: ProcessId,
    pub(crate) state: &'a mut SchedState,
}

impl ProcCtx<'_> {
    /// This process's own handle.
    pub fn id(&self) -> ProcessId {
        self.pid
    }

    /// The current simulation time.
    pub fn now(&self) -> SimTime {
        self.state.now
    }

    /// Reads a signal's current committed value.
    pub fn read(&self, signal: SignalId) -> Result<LogicVec, KernelError> {
        self.state.read_signal(signal)
    }

    /// Blocking write: commits immediately and synchronously wakes edge,
    /// level, and sensitivity waiters. This process itself is excluded; a
    /// process never re-triggers on its own write.
    pub fn write(&mut self, signal: SignalId, value: LogicVec) -> Result<(), KernelError> {
        self.state
            .commit_update(signal, value, Some(self.pid), false)?;
        Ok(())
    }

    /// Nonblocking write: captures `value` now and applies it in this
    /// instant's NBA phase. Readers see the old value until then.
    pub fn write_nonblocking(
        &mut self,
        signal: SignalId,
        value: LogicVec,
    ) -> Result<(), KernelError> {
        self.write_nonblocking_delayed(signal, value, 0)
    }

    /// Nonblocking write applying in the NBA phase `delay_fs` from now.
    pub fn write_nonblocking_delayed(
        &mut self,
        signal: SignalId,
        value: LogicVec,
        delay_fs: u64,
    ) -> Result<(), KernelError> {
        self.state
            .schedule_nba(signal, value, delay_fs)
    }

    /// Releases `count` resources, waking blocked requesters in FIFO order.
    pub fn sem_put(&mut self, sem: SemaphoreId, count: u32) -> Result<(), KernelError> {
        self.state.sem_put(sem, count, Some(self.pid))
    }

    /// Non-blocking acquire: returns `count` on success or 0 without
    /// changing any state.
    pub fn sem_try_get(&mut self, sem: SemaphoreId, count: u32) -> Result<u32, KernelError> {
        self.state.sem_try_get(sem, count)
    }

    /// Non-blocking send. `Ok(None)` means accepted; `Ok(Some(message))`
    /// hands the message back because the mailbox is full.
    pub fn mailbox_try_put(
        &mut self,
        mailbox: MailboxId,
        message: Box<dyn Any>,
    ) -> Result<Option<Box<dyn Any>>, KernelError> {
        self.state.mailbox_try_put(mailbox, message)
    }

    /// Non-blocking typed receive. `Ok(None)` when empty; an error when the
    /// front message is not a `T` (the message stays queued).
    pub fn mailbox_try_get<T: 'static>(
        &mut self,
        mailbox: MailboxId,
    ) -> Result<Option<Box<T>>, KernelError> {
        self.state.mailbox_try_get::<T>(mailbox)
    }

    /// Number of messages currently queued in a mailbox.
    pub fn mailbox_len(&self, mailbox: MailboxId) -> Result<usize, KernelError> {
        self.state.mailbox_len(mailbox)
    }

    /// Triggers a named event: wakes all current waiters and leaves the
    /// triggered flag readable for the rest of this instant.
    pub fn event_trigger(&mut self, event: EventId) -> Result<(), KernelError> {
        self.state.event_trigger(event)
    }

    /// Whether the event triggered within the current instant. The pulse
    /// clears when time advances.
    pub fn event_triggered(&self, event: EventId) -> Result<bool, KernelError> {
        self.state.event_triggered(event)
    }

    /// Spawns child processes at the current instant and returns their
    /// handles, for use in a `Join` wait. Children are one-shot bodies named
    /// after this process.
    pub fn fork(
        &mut self,
        children: Vec<Box<dyn ProcessBody>>,
    ) -> Result<Vec<ProcessId>, KernelError> {
        self.state.fork(self.pid, children)
    }

    /// Appends a line to the run's display output.
    pub fn display(&mut self, message: impl Into<String>) {
        self.state.display.push(message.into());
    }

    /// Requests voluntary termination of the whole run, like `$finish`.
    pub fn finish(&mut self) {
        self.state.finish = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_condition_debug_is_compact() {
        let c = WaitCondition::Delay(5);
        assert_eq!(format!("{c:?}"), "Delay(5)");
        let c = WaitCondition::SemAcquire {
            sem: SemaphoreId::from_raw(2),
            count: 3,
        };
        assert_eq!(format!("{c:?}"), "SemAcquire(#2, 3)");
    }

    #[test]
    fn wait_kind_display_for_reports() {
        let k = WaitKind::MailboxGet(MailboxId::from_raw(0));
        assert_eq!(k.to_string(), "a message from mailbox #0");
        let k = WaitKind::Join {
            remaining: vec![ProcessId::from_raw(1), ProcessId::from_raw(2)],
            mode: JoinMode::All,
        };
        assert_eq!(k.to_string(), "join of 2 child process(es)");
    }

    #[test]
    fn wake_debug_hides_payload() {
        let w = Wake::MailboxMessage(Box::new(LogicVec::from_bool(true)));
        assert_eq!(format!("{w:?}"), "MailboxMessage(..)");
    }

    #[test]
    fn join_mode_equality() {
        assert_eq!(JoinMode::All, JoinMode::All);
        assert_ne!(JoinMode::Any, JoinMode::None);
    }
}
