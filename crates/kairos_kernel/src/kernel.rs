//! The simulation kernel: process table, region fixpoint loop, and wake
//! machinery.
//!
//! [`Kernel`] drives time forward one instant at a time. Within an instant
//! the Active region is drained to a fixpoint (running processes and
//! committing blocking updates, which may enqueue more Active work), then
//! one Inactive batch is promoted, then the NBA batch commits all
//! nonblocking values together. Only when no region has work left does the
//! clock advance to the next scheduled instant.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use kairos_common::{Arena, Ident, Interner, LogicVec};
use kairos_diagnostics::{Diagnostic, DiagnosticSink};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::{ConfigError, KernelConfig};
use crate::error::KernelError;
use crate::event::{Action, EventQueue, Region, SimEvent};
use crate::ids::{EventId, MailboxId, ProcessId, SemaphoreId, SignalId};
use crate::mailbox::Mailbox;
use crate::named_event::EventState;
use crate::process::{
    JoinMode, ProcCtx, ProcessBody, ProcessSlot, ProcessState, ProcessStatus, Sensitivity, Step,
    WaitCondition, WaitKind, Wake,
};
use crate::semaphore::Semaphore;
use crate::signal::{EdgeWaiter, SignalStore};
use crate::time::SimTime;

/// Diagnostic codes the kernel emits.
pub mod codes {
    use kairos_diagnostics::{Category, DiagnosticCode};

    /// A semaphore was released above its initial count (strict mode).
    pub const SEM_OVER_RELEASE: DiagnosticCode = DiagnosticCode::new(Category::Warning, 101);
    /// Several nonblocking writes hit one signal in the same instant; the
    /// last one wins (strict mode).
    pub const NBA_OVERWRITE: DiagnosticCode = DiagnosticCode::new(Category::Warning, 102);
    /// The run ended with suspended processes and nothing left to wake them.
    pub const STARVATION_DEADLOCK: DiagnosticCode =
        DiagnosticCode::new(Category::Scheduling, 1);
}

/// A process suspended on a level predicate.
struct LevelWaiter {
    process: ProcessId,
    watch: Vec<SignalId>,
    predicate: Box<dyn Fn(&SignalStore) -> bool>,
}

/// The shared scheduler state a running process can reach through
/// [`ProcCtx`].
pub(crate) struct SchedState {
    pub now: SimTime,
    pub queue: EventQueue,
    pub signals: SignalStore,
    pub processes: Arena<ProcessId, ProcessSlot>,
    pub semaphores: Arena<SemaphoreId, Semaphore>,
    pub mailboxes: Arena<MailboxId, Mailbox>,
    pub events: Arena<EventId, EventState>,
    level_waiters: Vec<LevelWaiter>,
    process_names: HashMap<Ident, ProcessId>,
    pub interner: Interner,
    pub diagnostics: Arc<DiagnosticSink>,
    pub display: Vec<String>,
    pub finish: bool,
    pub strict: bool,
    fork_seq: u64,
}

fn unknown(kind: &'static str, index: u32) -> KernelError {
    KernelError::UnknownHandle { kind, index }
}

impl SchedState {
    fn new(strict: bool) -> Self {
        Self {
            now: SimTime::zero(),
            queue: EventQueue::new(),
            signals: SignalStore::new(),
            processes: Arena::new(),
            semaphores: Arena::new(),
            mailboxes: Arena::new(),
            events: Arena::new(),
            level_waiters: Vec::new(),
            process_names: HashMap::new(),
            interner: Interner::new(),
            diagnostics: Arc::new(DiagnosticSink::new()),
            display: Vec::new(),
            finish: false,
            strict,
            fork_seq: 0,
        }
    }

    pub(crate) fn read_signal(&self, signal: SignalId) -> Result<LogicVec, KernelError> {
        self.signals
            .try_state(signal)
            .map(|s| s.value().clone())
            .ok_or_else(|| unknown("signal", signal.as_raw()))
    }

    fn check_width(&self, signal: SignalId, value: &LogicVec) -> Result<(), KernelError> {
        let state = self
            .signals
            .try_state(signal)
            .ok_or_else(|| unknown("signal", signal.as_raw()))?;
        if state.width() != value.width() {
            return Err(KernelError::WidthMismatch {
                signal: self.interner.resolve(state.name()).to_string(),
                declared: state.width(),
                written: value.width(),
            });
        }
        Ok(())
    }

    /// Schedules a nonblocking apply: the value is captured now and becomes
    /// visible in the NBA phase `delay_fs` from now.
    pub(crate) fn schedule_nba(
        &mut self,
        signal: SignalId,
        value: LogicVec,
        delay_fs: u64,
    ) -> Result<(), KernelError> {
        self.check_width(signal, &value)?;
        self.queue.schedule(
            self.now.plus_fs(delay_fs),
            Region::Nba,
            Action::NbaUpdate { signal, value },
        );
        Ok(())
    }

    /// Commits a value to a signal and wakes its dependents.
    ///
    /// Edge waiters and statically sensitive processes wake per transition;
    /// the writing process never wakes on its own update. Level predicates
    /// are re-tested right away unless the caller is mid-batch and defers
    /// them to the batch boundary.
    pub(crate) fn commit_update(
        &mut self,
        signal: SignalId,
        value: LogicVec,
        writer: Option<ProcessId>,
        defer_level: bool,
    ) -> Result<bool, KernelError> {
        self.check_width(signal, &value)?;

        let state = self.signals.state_mut(signal);
        if *state.value() == value {
            return Ok(false);
        }
        state.previous = state.value.clone();
        state.value = value;
        let prev = state.previous.clone();
        let curr = state.value.clone();
        let mut edge_woken: Vec<EdgeWaiter> = Vec::new();
        state.edge_waiters.retain(|w| {
            if w.edge.detect(&prev, &curr) {
                edge_woken.push(*w);
                false
            } else {
                true
            }
        });
        let sensitive = state.sensitive.clone();

        for waiter in edge_woken {
            self.schedule_wake(
                waiter.process,
                Wake::Edge {
                    signal,
                    edge: waiter.edge,
                },
            );
        }
        for pid in sensitive {
            if Some(pid) == writer {
                continue;
            }
            let slot = self.processes.get(pid);
            if !matches!(slot.state, ProcessState::Armed) {
                continue;
            }
            let fires = match &slot.sensitivity {
                Sensitivity::Signals(_) => true,
                Sensitivity::Edges(list) => list
                    .iter()
                    .any(|(s, edge)| *s == signal && edge.detect(&prev, &curr)),
                Sensitivity::None => false,
            };
            if fires {
                self.schedule_wake(pid, Wake::Activated);
            }
        }
        if !defer_level {
            self.eval_level_waiters(&[signal]);
        }
        Ok(true)
    }

    /// Re-tests level predicates whose watch list intersects `changed`.
    /// Called only at commit boundaries, never while a batch is partially
    /// applied.
    pub(crate) fn eval_level_waiters(&mut self, changed: &[SignalId]) {
        if self.level_waiters.is_empty() {
            return;
        }
        let waiters = std::mem::take(&mut self.level_waiters);
        let mut ready = Vec::new();
        let mut kept = Vec::with_capacity(waiters.len());
        for waiter in waiters {
            let affected = waiter.watch.iter().any(|s| changed.contains(s));
            if affected && (waiter.predicate)(&self.signals) {
                ready.push(waiter.process);
            } else {
                kept.push(waiter);
            }
        }
        self.level_waiters = kept;
        for pid in ready {
            self.schedule_wake(pid, Wake::LevelMet);
        }
    }

    /// Makes a process runnable and enqueues its resume event.
    ///
    /// At most one resume can be in flight per process; the wait
    /// registration that called us is responsible for having already
    /// removed itself.
    pub(crate) fn schedule_wake(&mut self, pid: ProcessId, wake: Wake) {
        let slot = self.processes.get_mut(pid);
        if matches!(slot.state, ProcessState::Finished) || slot.pending_resume {
            return;
        }
        slot.pending_resume = true;
        slot.state = ProcessState::Runnable;
        self.queue.schedule(
            self.now,
            Region::Active,
            Action::Resume { process: pid, wake },
        );
    }

    /// Parks a process on the condition its body returned.
    ///
    /// Conditions that are already satisfied resume the process within the
    /// current Active fixpoint rather than leaving it parked.
    pub(crate) fn suspend(
        &mut self,
        pid: ProcessId,
        condition: WaitCondition,
    ) -> Result<(), KernelError> {
        match condition {
            WaitCondition::Delay(delay_fs) => {
                let slot = self.processes.get_mut(pid);
                slot.state = ProcessState::Suspended(WaitKind::Delay);
                slot.pending_resume = true;
                // #0 parks into this instant's Inactive region; a real delay
                // lands in the Active region of the target instant.
                let (time, region) = if delay_fs == 0 {
                    (self.now, Region::Inactive)
                } else {
                    (self.now.plus_fs(delay_fs), Region::Active)
                };
                self.queue.schedule(
                    time,
                    region,
                    Action::Resume {
                        process: pid,
                        wake: Wake::DelayElapsed,
                    },
                );
            }

            WaitCondition::Edge { signal, edge } => {
                if !self.signals.contains(signal) {
                    return Err(unknown("signal", signal.as_raw()));
                }
                self.processes.get_mut(pid).state =
                    ProcessState::Suspended(WaitKind::Edge(signal, edge));
                self.signals
                    .state_mut(signal)
                    .edge_waiters
                    .push(EdgeWaiter { process: pid, edge });
            }

            WaitCondition::Level { watch, predicate } => {
                for s in &watch {
                    if !self.signals.contains(*s) {
                        return Err(unknown("signal", s.as_raw()));
                    }
                }
                self.processes.get_mut(pid).state = ProcessState::Suspended(WaitKind::Level);
                if predicate(&self.signals) {
                    self.schedule_wake(pid, Wake::LevelMet);
                } else {
                    self.level_waiters.push(LevelWaiter {
                        process: pid,
                        watch,
                        predicate,
                    });
                }
            }

            WaitCondition::Event(event) => {
                if self.events.try_get(event).is_none() {
                    return Err(unknown("event", event.as_raw()));
                }
                self.processes.get_mut(pid).state =
                    ProcessState::Suspended(WaitKind::Event(event));
                let now_fs = self.now.fs;
                if self.events.get(event).is_triggered(now_fs) {
                    self.schedule_wake(pid, Wake::EventTriggered(event));
                } else {
                    self.events.get_mut(event).add_waiter(pid);
                }
            }

            WaitCondition::SemAcquire { sem, count } => {
                if self.semaphores.try_get(sem).is_none() {
                    return Err(unknown("semaphore", sem.as_raw()));
                }
                self.processes.get_mut(pid).state =
                    ProcessState::Suspended(WaitKind::Semaphore(sem, count));
                let semaphore = self.semaphores.get_mut(sem);
                if semaphore.can_acquire_now(count) {
                    semaphore.take(count);
                    self.schedule_wake(pid, Wake::SemAcquired { count });
                } else {
                    semaphore.enqueue(pid, count);
                }
            }

            WaitCondition::MailboxPut { mailbox, message } => {
                if self.mailboxes.try_get(mailbox).is_none() {
                    return Err(unknown("mailbox", mailbox.as_raw()));
                }
                self.processes.get_mut(pid).state =
                    ProcessState::Suspended(WaitKind::MailboxPut(mailbox));
                let accepted = self
                    .mailboxes
                    .get_mut(mailbox)
                    .put_or_enqueue(pid, message);
                if accepted {
                    self.schedule_wake(pid, Wake::MailboxAccepted);
                }
                self.balance_mailbox(mailbox);
            }

            WaitCondition::MailboxGet { mailbox } => {
                if self.mailboxes.try_get(mailbox).is_none() {
                    return Err(unknown("mailbox", mailbox.as_raw()));
                }
                self.processes.get_mut(pid).state =
                    ProcessState::Suspended(WaitKind::MailboxGet(mailbox));
                if let Some(message) = self.mailboxes.get_mut(mailbox).get_or_enqueue(pid) {
                    self.schedule_wake(pid, Wake::MailboxMessage(message));
                    self.balance_mailbox(mailbox);
                }
            }

            WaitCondition::Join { children, mode } => {
                for child in &children {
                    if self.processes.try_get(*child).is_none() {
                        return Err(unknown("process", child.as_raw()));
                    }
                }
                let satisfied = match mode {
                    JoinMode::None => true,
                    JoinMode::All => children
                        .iter()
                        .all(|c| matches!(self.processes.get(*c).state, ProcessState::Finished)),
                    JoinMode::Any => children
                        .iter()
                        .any(|c| matches!(self.processes.get(*c).state, ProcessState::Finished)),
                };
                let remaining = match mode {
                    JoinMode::All => children
                        .iter()
                        .copied()
                        .filter(|c| {
                            !matches!(self.processes.get(*c).state, ProcessState::Finished)
                        })
                        .collect(),
                    _ => children,
                };
                self.processes.get_mut(pid).state =
                    ProcessState::Suspended(WaitKind::Join { remaining, mode });
                if satisfied {
                    self.schedule_wake(pid, Wake::Joined);
                }
            }
        }
        Ok(())
    }

    /// Ends an activation: one-shot processes finish, statically sensitive
    /// ones re-arm for their next trigger.
    pub(crate) fn complete(&mut self, pid: ProcessId) -> Result<(), KernelError> {
        let one_shot = matches!(self.processes.get(pid).sensitivity, Sensitivity::None);
        if one_shot {
            self.processes.get_mut(pid).state = ProcessState::Finished;
            self.on_child_finished(pid);
        } else {
            self.processes.get_mut(pid).state = ProcessState::Armed;
        }
        Ok(())
    }

    fn on_child_finished(&mut self, child: ProcessId) {
        let Some(parent) = self.processes.get(child).parent else {
            return;
        };
        let wake_parent = {
            let slot = self.processes.get_mut(parent);
            match &mut slot.state {
                ProcessState::Suspended(WaitKind::Join { remaining, mode }) => match mode {
                    JoinMode::All => {
                        remaining.retain(|c| *c != child);
                        remaining.is_empty()
                    }
                    JoinMode::Any => remaining.contains(&child),
                    JoinMode::None => false,
                },
                _ => false,
            }
        };
        if wake_parent {
            self.schedule_wake(parent, Wake::Joined);
        }
    }

    fn balance_mailbox(&mut self, mailbox: MailboxId) {
        let wakes = self.mailboxes.get_mut(mailbox).balance();
        for (pid, message) in wakes.deliveries {
            self.schedule_wake(pid, Wake::MailboxMessage(message));
        }
        for pid in wakes.accepted {
            self.schedule_wake(pid, Wake::MailboxAccepted);
        }
    }

    pub(crate) fn sem_put(
        &mut self,
        sem: SemaphoreId,
        count: u32,
        by: Option<ProcessId>,
    ) -> Result<(), KernelError> {
        if self.semaphores.try_get(sem).is_none() {
            return Err(unknown("semaphore", sem.as_raw()));
        }
        let semaphore = self.semaphores.get_mut(sem);
        let over_release =
            self.strict && semaphore.available() + count > semaphore.initial();
        let grants = semaphore.release(count);
        if over_release {
            let mut diag = Diagnostic::warning(
                codes::SEM_OVER_RELEASE,
                format!(
                    "semaphore #{} released above its initial count of {}",
                    sem.as_raw(),
                    self.semaphores.get(sem).initial()
                ),
            )
            .at_time(self.now.fs);
            if let Some(pid) = by {
                let name = self.interner.resolve(self.processes.get(pid).name);
                diag = diag.for_process(name);
            }
            self.diagnostics.emit(diag);
        }
        for (pid, granted) in grants {
            self.schedule_wake(pid, Wake::SemAcquired { count: granted });
        }
        Ok(())
    }

    pub(crate) fn sem_try_get(
        &mut self,
        sem: SemaphoreId,
        count: u32,
    ) -> Result<u32, KernelError> {
        self.semaphores
            .try_get(sem)
            .ok_or_else(|| unknown("semaphore", sem.as_raw()))?;
        Ok(self.semaphores.get_mut(sem).try_get(count))
    }

    pub(crate) fn mailbox_try_put(
        &mut self,
        mailbox: MailboxId,
        message: Box<dyn Any>,
    ) -> Result<Option<Box<dyn Any>>, KernelError> {
        self.mailboxes
            .try_get(mailbox)
            .ok_or_else(|| unknown("mailbox", mailbox.as_raw()))?;
        let rejected = self.mailboxes.get_mut(mailbox).try_put(message);
        if rejected.is_none() {
            self.balance_mailbox(mailbox);
        }
        Ok(rejected)
    }

    pub(crate) fn mailbox_try_get<T: 'static>(
        &mut self,
        mailbox: MailboxId,
    ) -> Result<Option<Box<T>>, KernelError> {
        self.mailboxes
            .try_get(mailbox)
            .ok_or_else(|| unknown("mailbox", mailbox.as_raw()))?;
        let received = self.mailboxes.get_mut(mailbox).try_get::<T>()?;
        if received.is_some() {
            self.balance_mailbox(mailbox);
        }
        Ok(received)
    }

    pub(crate) fn mailbox_len(&self, mailbox: MailboxId) -> Result<usize, KernelError> {
        self.mailboxes
            .try_get(mailbox)
            .map(Mailbox::len)
            .ok_or_else(|| unknown("mailbox", mailbox.as_raw()))
    }

    pub(crate) fn event_trigger(&mut self, event: EventId) -> Result<(), KernelError> {
        if self.events.try_get(event).is_none() {
            return Err(unknown("event", event.as_raw()));
        }
        let now_fs = self.now.fs;
        let woken = self.events.get_mut(event).trigger(now_fs);
        for pid in woken {
            self.schedule_wake(pid, Wake::EventTriggered(event));
        }
        Ok(())
    }

    pub(crate) fn event_triggered(&self, event: EventId) -> Result<bool, KernelError> {
        self.events
            .try_get(event)
            .map(|e| e.is_triggered(self.now.fs))
            .ok_or_else(|| unknown("event", event.as_raw()))
    }

    pub(crate) fn fork(
        &mut self,
        parent: ProcessId,
        children: Vec<Box<dyn ProcessBody>>,
    ) -> Result<Vec<ProcessId>, KernelError> {
        let base = self
            .interner
            .resolve(self.processes.get(parent).name)
            .to_string();
        let mut ids = Vec::with_capacity(children.len());
        for body in children {
            let name = loop {
                let candidate = format!("{base}.fork{}", self.fork_seq);
                self.fork_seq += 1;
                let ident = self.interner.intern(&candidate);
                if !self.process_names.contains_key(&ident) {
                    break ident;
                }
            };
            ids.push(self.insert_process(name, Sensitivity::None, body, Some(parent))?);
        }
        Ok(ids)
    }

    /// Registers a process. One-shot and signal-sensitive processes get an
    /// initial activation at the current instant; edge-sensitive processes
    /// arm and wait for their first edge.
    pub(crate) fn insert_process(
        &mut self,
        name: Ident,
        sensitivity: Sensitivity,
        body: Box<dyn ProcessBody>,
        parent: Option<ProcessId>,
    ) -> Result<ProcessId, KernelError> {
        if self.process_names.contains_key(&name) {
            return Err(KernelError::DuplicateName {
                name: self.interner.resolve(name).to_string(),
            });
        }
        let watch: Vec<SignalId> = match &sensitivity {
            Sensitivity::None => Vec::new(),
            Sensitivity::Signals(list) => list.clone(),
            Sensitivity::Edges(list) => list.iter().map(|(s, _)| *s).collect(),
        };
        for s in &watch {
            if !self.signals.contains(*s) {
                return Err(unknown("signal", s.as_raw()));
            }
        }

        let activate_now = !matches!(sensitivity, Sensitivity::Edges(_));
        let pid = self.processes.alloc(ProcessSlot {
            name,
            body: Some(body),
            state: if activate_now {
                ProcessState::Runnable
            } else {
                ProcessState::Armed
            },
            sensitivity,
            parent,
            pending_resume: activate_now,
        });
        self.process_names.insert(name, pid);
        for s in watch {
            let sensitive = &mut self.signals.state_mut(s).sensitive;
            if !sensitive.contains(&pid) {
                sensitive.push(pid);
            }
        }
        if activate_now {
            self.queue.schedule(
                self.now,
                Region::Active,
                Action::Resume {
                    process: pid,
                    wake: Wake::Activated,
                },
            );
        }
        Ok(pid)
    }

    /// Reports a starvation deadlock if any process is still suspended.
    /// Returns whether one was reported.
    fn deadlock_check(&mut self) -> bool {
        let blocked: Vec<(String, String)> = self
            .processes
            .iter()
            .filter_map(|(_, slot)| match &slot.state {
                ProcessState::Suspended(kind) => Some((
                    self.interner.resolve(slot.name).to_string(),
                    kind.to_string(),
                )),
                _ => None,
            })
            .collect();
        if blocked.is_empty() {
            return false;
        }
        let mut diag = Diagnostic::warning(
            codes::STARVATION_DEADLOCK,
            format!(
                "starvation deadlock: {} process(es) suspended with no pending events",
                blocked.len()
            ),
        )
        .at_time(self.now.fs);
        for (name, waiting_on) in &blocked {
            diag = diag.with_note(format!("{name} is waiting on {waiting_on}"));
        }
        self.diagnostics.emit(diag);
        true
    }
}

/// The outcome of one [`Kernel::step_slot`] call.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepResult {
    /// More work may exist at a later instant.
    Continued,
    /// Nothing left to do: queue empty, finish requested, or time limit hit.
    Done,
}

/// The report of a completed run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The simulation time when the run ended.
    pub final_time: SimTime,
    /// Whether a process requested termination (`finish`).
    pub finished_by_user: bool,
    /// Whether the run ended with suspended processes and an empty queue.
    pub deadlocked: bool,
    /// Number of time slots executed.
    pub slots: u64,
    /// Number of process activations executed.
    pub activations: u64,
    /// All display output collected during the run.
    pub display_output: Vec<String>,
}

/// The discrete-event simulation kernel.
///
/// Single-threaded and cooperative: processes run one at a time and yield
/// only at explicit suspension points, so shared state needs no locking.
/// The intra-region order in which ready processes run is intentionally
/// unspecified; enable `shuffle_seed` in the config to randomize it and
/// flush out accidental order dependence.
pub struct Kernel {
    state: SchedState,
    max_slot_iterations: u32,
    shuffle_rng: Option<StdRng>,
    time_limit_fs: Option<u64>,
    slots: u64,
    activations: u64,
}

impl Kernel {
    /// Creates a kernel with default configuration.
    pub fn new() -> Self {
        Self::from_parts(&KernelConfig::default(), None)
    }

    /// Creates a kernel from a loaded configuration.
    pub fn with_config(config: &KernelConfig) -> Result<Self, ConfigError> {
        let limit = config.time_limit_fs()?;
        Ok(Self::from_parts(config, limit))
    }

    fn from_parts(config: &KernelConfig, time_limit_fs: Option<u64>) -> Self {
        Self {
            state: SchedState::new(config.kernel.strict),
            max_slot_iterations: config.kernel.max_slot_iterations,
            shuffle_rng: config.kernel.shuffle_seed.map(StdRng::seed_from_u64),
            time_limit_fs,
            slots: 0,
            activations: 0,
        }
    }

    /// Declares a signal initialized to all-X.
    pub fn declare_signal(&mut self, name: &str, width: u32) -> Result<SignalId, KernelError> {
        let ident = self.state.interner.intern(name);
        self.state
            .signals
            .declare(ident, width)
            .ok_or_else(|| KernelError::DuplicateName {
                name: name.to_string(),
            })
    }

    /// Declares a signal with an explicit initial value.
    pub fn declare_signal_init(
        &mut self,
        name: &str,
        init: LogicVec,
    ) -> Result<SignalId, KernelError> {
        let ident = self.state.interner.intern(name);
        self.state
            .signals
            .declare_init(ident, init)
            .ok_or_else(|| KernelError::DuplicateName {
                name: name.to_string(),
            })
    }

    /// Finds a declared signal by name.
    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        let ident = self.state.interner.lookup(name)?;
        self.state.signals.lookup(ident)
    }

    /// The current committed value of a signal.
    ///
    /// # Panics
    ///
    /// Panics if `signal` was not issued by this kernel.
    pub fn signal_value(&self, signal: SignalId) -> &LogicVec {
        self.state.signals.value(signal)
    }

    /// Registers a process under a unique name.
    pub fn spawn(
        &mut self,
        name: &str,
        sensitivity: Sensitivity,
        body: Box<dyn ProcessBody>,
    ) -> Result<ProcessId, KernelError> {
        let ident = self.state.interner.intern(name);
        self.state.insert_process(ident, sensitivity, body, None)
    }

    /// The lifecycle state of a process, if the handle is valid.
    pub fn process_status(&self, pid: ProcessId) -> Option<ProcessStatus> {
        self.state.processes.try_get(pid).map(|slot| match slot.state {
            ProcessState::Runnable => ProcessStatus::Runnable,
            ProcessState::Suspended(_) => ProcessStatus::Suspended,
            ProcessState::Armed => ProcessStatus::Armed,
            ProcessState::Finished => ProcessStatus::Finished,
        })
    }

    /// Creates a semaphore holding `initial` resources.
    pub fn new_semaphore(&mut self, initial: u32) -> SemaphoreId {
        self.state.semaphores.alloc(Semaphore::new(initial))
    }

    /// The semaphore behind a handle, if valid.
    pub fn semaphore(&self, sem: SemaphoreId) -> Option<&Semaphore> {
        self.state.semaphores.try_get(sem)
    }

    /// Creates a mailbox; a bound of 0 means unbounded.
    pub fn new_mailbox(&mut self, bound: usize) -> MailboxId {
        self.state.mailboxes.alloc(Mailbox::new(bound))
    }

    /// The mailbox behind a handle, if valid.
    pub fn mailbox(&self, mailbox: MailboxId) -> Option<&Mailbox> {
        self.state.mailboxes.try_get(mailbox)
    }

    /// Creates a named event. Copying the returned handle aliases the same
    /// event record.
    pub fn new_event(&mut self) -> EventId {
        self.state.events.alloc(EventState::new())
    }

    /// The event record behind a handle, if valid.
    pub fn event(&self, event: EventId) -> Option<&EventState> {
        self.state.events.try_get(event)
    }

    /// Schedules external stimulus: commit `value` to `signal` after
    /// `delay_fs`, waking dependents like any blocking update.
    pub fn schedule_update(
        &mut self,
        signal: SignalId,
        value: LogicVec,
        delay_fs: u64,
    ) -> Result<(), KernelError> {
        self.state.check_width(signal, &value)?;
        self.state.queue.schedule(
            self.state.now.plus_fs(delay_fs),
            Region::Active,
            Action::Update { signal, value },
        );
        Ok(())
    }

    /// The current simulation time.
    pub fn current_time(&self) -> SimTime {
        self.state.now
    }

    /// Display output collected so far.
    pub fn display_output(&self) -> &[String] {
        &self.state.display
    }

    /// The diagnostics sink for this kernel.
    pub fn diagnostics(&self) -> Arc<DiagnosticSink> {
        Arc::clone(&self.state.diagnostics)
    }

    /// Caps the run at `limit_fs` femtoseconds of simulated time.
    pub fn set_time_limit(&mut self, limit_fs: u64) {
        self.time_limit_fs = Some(limit_fs);
    }

    /// Overrides the per-instant iteration bound.
    pub fn set_max_slot_iterations(&mut self, max: u32) {
        self.max_slot_iterations = max;
    }

    /// Enables or disables strict-mode checks.
    pub fn set_strict(&mut self, strict: bool) {
        self.state.strict = strict;
    }

    /// Runs for `duration_fs` of simulated time from now.
    pub fn run(&mut self, duration_fs: u64) -> Result<RunResult, KernelError> {
        self.time_limit_fs = Some(self.state.now.fs + duration_fs);
        self.run_loop()
    }

    /// Runs until quiescence or voluntary termination, clearing any time
    /// limit a previous [`run`](Self::run) left behind.
    pub fn run_to_completion(&mut self) -> Result<RunResult, KernelError> {
        self.time_limit_fs = None;
        self.run_loop()
    }

    fn run_loop(&mut self) -> Result<RunResult, KernelError> {
        while self.step_slot()? == StepResult::Continued {}
        let deadlocked =
            !self.state.finish && self.state.queue.is_empty() && self.state.deadlock_check();
        Ok(RunResult {
            final_time: self.state.now,
            finished_by_user: self.state.finish,
            deadlocked,
            slots: self.slots,
            activations: self.activations,
            display_output: self.state.display.clone(),
        })
    }

    /// Executes one complete time slot: Active to fixpoint, Inactive,
    /// NBA, looping while same-instant work keeps appearing.
    pub fn step_slot(&mut self) -> Result<StepResult, KernelError> {
        if self.state.finish {
            return Ok(StepResult::Done);
        }
        let Some(next) = self.state.queue.peek_next_time() else {
            return Ok(StepResult::Done);
        };
        if let Some(limit) = self.time_limit_fs {
            if next.fs > limit {
                return Ok(StepResult::Done);
            }
        }
        self.state.now = self.state.now.advance_to(next.fs);

        let mut iterations: u32 = 0;
        loop {
            if self.state.finish {
                break;
            }
            // Active region to fixpoint: work scheduled by this batch is
            // re-considered before the region counts as drained.
            loop {
                let batch = self.state.queue.pop_batch(self.state.now, Region::Active);
                if batch.is_empty() {
                    break;
                }
                self.bump_iterations(&mut iterations)?;
                self.dispatch_batch(batch)?;
                if self.state.finish {
                    break;
                }
            }
            if self.state.finish {
                break;
            }
            // Inactive promotes once Active is empty; anything it spawns
            // goes back through Active first.
            let batch = self.state.queue.pop_batch(self.state.now, Region::Inactive);
            if !batch.is_empty() {
                self.bump_iterations(&mut iterations)?;
                self.dispatch_batch(batch)?;
                continue;
            }
            // NBA phase: every captured value commits before any woken
            // process runs.
            let batch = self.state.queue.pop_batch(self.state.now, Region::Nba);
            if !batch.is_empty() {
                self.bump_iterations(&mut iterations)?;
                self.apply_nba_batch(batch)?;
                continue;
            }
            break;
        }
        self.slots += 1;
        Ok(StepResult::Continued)
    }

    fn bump_iterations(&self, iterations: &mut u32) -> Result<(), KernelError> {
        *iterations += 1;
        if *iterations > self.max_slot_iterations {
            return Err(KernelError::SlotIterationLimit {
                time_fs: self.state.now.fs,
                limit: self.max_slot_iterations,
            });
        }
        Ok(())
    }

    fn dispatch_batch(&mut self, mut batch: Vec<SimEvent>) -> Result<(), KernelError> {
        if let Some(rng) = &mut self.shuffle_rng {
            batch.shuffle(rng);
        }
        for event in batch {
            if self.state.finish {
                break;
            }
            self.dispatch(event)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, event: SimEvent) -> Result<(), KernelError> {
        match event.action {
            Action::Update { signal, value } => {
                self.state.commit_update(signal, value, None, false)?;
                Ok(())
            }
            Action::NbaUpdate { .. } => Err(KernelError::Internal {
                reason: "nonblocking update dispatched outside the NBA phase".into(),
            }),
            Action::Resume { process, wake } => self.activate(process, wake),
        }
    }

    fn activate(&mut self, pid: ProcessId, wake: Wake) -> Result<(), KernelError> {
        {
            let slot = self.state.processes.get_mut(pid);
            slot.pending_resume = false;
            if matches!(slot.state, ProcessState::Finished) {
                return Ok(());
            }
            slot.state = ProcessState::Runnable;
        }
        let mut body =
            self.state
                .processes
                .get_mut(pid)
                .body
                .take()
                .ok_or_else(|| KernelError::Internal {
                    reason: format!("process #{} resumed while running", pid.as_raw()),
                })?;
        let outcome = {
            let mut cx = ProcCtx {
                pid,
                state: &mut self.state,
            };
            body.resume(&mut cx, wake)
        };
        self.state.processes.get_mut(pid).body = Some(body);
        self.activations += 1;
        match outcome? {
            Step::Wait(condition) => self.state.suspend(pid, condition),
            Step::Done => self.state.complete(pid),
        }
    }

    /// Commits one instant's nonblocking updates simultaneously.
    ///
    /// The batch is coalesced per signal first (last write wins, by
    /// sequence), so every captured value was computed before any commit
    /// becomes visible: the classic `a<=b; b<=a` swap actually swaps.
    fn apply_nba_batch(&mut self, batch: Vec<SimEvent>) -> Result<(), KernelError> {
        let mut order: Vec<SignalId> = Vec::new();
        let mut values: HashMap<SignalId, LogicVec> = HashMap::new();
        let mut overwritten: Vec<SignalId> = Vec::new();
        for event in batch {
            let Action::NbaUpdate { signal, value } = event.action else {
                return Err(KernelError::Internal {
                    reason: "foreign event in NBA batch".into(),
                });
            };
            if values.insert(signal, value).is_some() {
                overwritten.push(signal);
            } else {
                order.push(signal);
            }
        }
        if self.state.strict {
            for signal in overwritten {
                let name = self
                    .state
                    .signals
                    .try_state(signal)
                    .map(|s| self.state.interner.resolve(s.name()).to_string())
                    .unwrap_or_else(|| format!("#{}", signal.as_raw()));
                self.state.diagnostics.emit(
                    Diagnostic::warning(
                        codes::NBA_OVERWRITE,
                        format!("multiple nonblocking writes to '{name}' in one instant; last wins"),
                    )
                    .at_time(self.state.now.fs),
                );
            }
        }
        let mut changed = Vec::new();
        for signal in order {
            if let Some(value) = values.remove(&signal) {
                if self.state.commit_update(signal, value, None, true)? {
                    changed.push(signal);
                }
            }
        }
        self.state.eval_level_waiters(&changed);
        Ok(())
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Step;
    use kairos_common::Logic;

    /// A body that writes a constant once and completes.
    struct WriteOnce {
        signal: SignalId,
        value: LogicVec,
    }

    impl ProcessBody for WriteOnce {
        fn resume(&mut self, cx: &mut ProcCtx<'_>, _wake: Wake) -> Result<Step, KernelError> {
            cx.write(self.signal, self.value.clone())?;
            Ok(Step::Done)
        }
    }

    /// A body that waits, then writes, then completes.
    struct DelayedWrite {
        signal: SignalId,
        value: LogicVec,
        delay_fs: u64,
        waited: bool,
    }

    impl ProcessBody for DelayedWrite {
        fn resume(&mut self, cx: &mut ProcCtx<'_>, _wake: Wake) -> Result<Step, KernelError> {
            if !self.waited {
                self.waited = true;
                return Ok(Step::Wait(WaitCondition::Delay(self.delay_fs)));
            }
            cx.write(self.signal, self.value.clone())?;
            Ok(Step::Done)
        }
    }

    struct FinishNow;

    impl ProcessBody for FinishNow {
        fn resume(&mut self, cx: &mut ProcCtx<'_>, _wake: Wake) -> Result<Step, KernelError> {
            cx.display("stopping");
            cx.finish();
            Ok(Step::Done)
        }
    }

    #[test]
    fn fresh_kernel_is_quiet() {
        let mut kernel = Kernel::new();
        let result = kernel.run_to_completion().unwrap();
        assert_eq!(result.final_time, SimTime::zero());
        assert!(!result.finished_by_user);
        assert!(!result.deadlocked);
        assert_eq!(result.activations, 0);
    }

    #[test]
    fn declare_signal_defaults_to_x() {
        let mut kernel = Kernel::new();
        let s = kernel.declare_signal("s", 4).unwrap();
        for i in 0..4 {
            assert_eq!(kernel.signal_value(s).get(i), Logic::X);
        }
    }

    #[test]
    fn duplicate_signal_name_rejected() {
        let mut kernel = Kernel::new();
        kernel.declare_signal("clk", 1).unwrap();
        let err = kernel.declare_signal("clk", 1).unwrap_err();
        assert!(matches!(err, KernelError::DuplicateName { .. }));
    }

    #[test]
    fn duplicate_process_name_rejected() {
        let mut kernel = Kernel::new();
        let s = kernel.declare_signal("s", 1).unwrap();
        let body = || {
            Box::new(WriteOnce {
                signal: s,
                value: LogicVec::from_bool(true),
            })
        };
        kernel.spawn("p", Sensitivity::None, body()).unwrap();
        let err = kernel.spawn("p", Sensitivity::None, body()).unwrap_err();
        assert!(matches!(err, KernelError::DuplicateName { .. }));
    }

    #[test]
    fn one_shot_process_runs_at_time_zero() {
        let mut kernel = Kernel::new();
        let s = kernel.declare_signal("s", 1).unwrap();
        let pid = kernel
            .spawn(
                "init",
                Sensitivity::None,
                Box::new(WriteOnce {
                    signal: s,
                    value: LogicVec::from_bool(true),
                }),
            )
            .unwrap();
        let result = kernel.run_to_completion().unwrap();
        assert_eq!(kernel.signal_value(s).to_u64(), Some(1));
        assert_eq!(kernel.process_status(pid), Some(ProcessStatus::Finished));
        assert_eq!(result.final_time, SimTime::zero());
    }

    #[test]
    fn delay_advances_time_exactly() {
        let mut kernel = Kernel::new();
        let s = kernel.declare_signal("s", 1).unwrap();
        kernel
            .spawn(
                "late",
                Sensitivity::None,
                Box::new(DelayedWrite {
                    signal: s,
                    value: LogicVec::from_bool(true),
                    delay_fs: SimTime::from_ns(7).fs,
                    waited: false,
                }),
            )
            .unwrap();
        let result = kernel.run_to_completion().unwrap();
        assert_eq!(result.final_time, SimTime::from_ns(7));
        assert_eq!(kernel.signal_value(s).to_u64(), Some(1));
    }

    #[test]
    fn external_update_fires_at_scheduled_time() {
        let mut kernel = Kernel::new();
        let s = kernel.declare_signal_init("s", LogicVec::from_bool(false)).unwrap();
        kernel
            .schedule_update(s, LogicVec::from_bool(true), SimTime::from_ns(10).fs)
            .unwrap();
        let result = kernel.run_to_completion().unwrap();
        assert_eq!(result.final_time, SimTime::from_ns(10));
        assert_eq!(kernel.signal_value(s).to_u64(), Some(1));
    }

    #[test]
    fn time_limit_stops_before_later_events() {
        let mut kernel = Kernel::new();
        let s = kernel.declare_signal_init("s", LogicVec::from_bool(false)).unwrap();
        kernel
            .schedule_update(s, LogicVec::from_bool(true), SimTime::from_ns(100).fs)
            .unwrap();
        let result = kernel.run(SimTime::from_ns(50).fs).unwrap();
        assert!(result.final_time < SimTime::from_ns(100));
        assert_eq!(kernel.signal_value(s).to_u64(), Some(0));
    }

    #[test]
    fn finish_is_reported() {
        let mut kernel = Kernel::new();
        kernel
            .spawn("stopper", Sensitivity::None, Box::new(FinishNow))
            .unwrap();
        let result = kernel.run_to_completion().unwrap();
        assert!(result.finished_by_user);
        assert_eq!(result.display_output, vec!["stopping".to_string()]);
    }

    #[test]
    fn width_mismatch_is_fatal() {
        let mut kernel = Kernel::new();
        let s = kernel.declare_signal("s", 4).unwrap();
        let err = kernel
            .schedule_update(s, LogicVec::from_bool(true), 0)
            .unwrap_err();
        assert!(matches!(err, KernelError::WidthMismatch { .. }));
    }

    #[test]
    fn unknown_signal_is_fatal() {
        let mut kernel = Kernel::new();
        let err = kernel
            .schedule_update(SignalId::from_raw(99), LogicVec::from_bool(true), 0)
            .unwrap_err();
        assert!(matches!(err, KernelError::UnknownHandle { kind: "signal", .. }));
    }

    #[test]
    fn find_signal_by_name() {
        let mut kernel = Kernel::new();
        let s = kernel.declare_signal("top.clk", 1).unwrap();
        assert_eq!(kernel.find_signal("top.clk"), Some(s));
        assert_eq!(kernel.find_signal("top.rst"), None);
    }

    #[test]
    fn step_slot_done_when_idle() {
        let mut kernel = Kernel::new();
        assert_eq!(kernel.step_slot().unwrap(), StepResult::Done);
    }

    #[test]
    fn edge_sensitive_process_waits_for_first_edge() {
        let mut kernel = Kernel::new();
        let clk = kernel
            .declare_signal_init("clk", LogicVec::from_bool(false))
            .unwrap();
        let q = kernel
            .declare_signal_init("q", LogicVec::from_bool(false))
            .unwrap();
        let pid = kernel
            .spawn(
                "ff",
                Sensitivity::Edges(vec![(clk, crate::signal::EdgeKind::Posedge)]),
                Box::new(WriteOnce {
                    signal: q,
                    value: LogicVec::from_bool(true),
                }),
            )
            .unwrap();
        assert_eq!(kernel.process_status(pid), Some(ProcessStatus::Armed));

        // No clock edge yet: q stays 0.
        let _ = kernel.run(SimTime::from_ns(1).fs).unwrap();
        assert_eq!(kernel.signal_value(q).to_u64(), Some(0));

        kernel
            .schedule_update(clk, LogicVec::from_bool(true), SimTime::from_ns(1).fs)
            .unwrap();
        let _ = kernel.run(SimTime::from_ns(5).fs).unwrap();
        assert_eq!(kernel.signal_value(q).to_u64(), Some(1));
    }

    #[test]
    fn deadlock_reported_when_queue_drains() {
        struct WaitForever {
            event: EventId,
        }
        impl ProcessBody for WaitForever {
            fn resume(&mut self, _cx: &mut ProcCtx<'_>, wake: Wake) -> Result<Step, KernelError> {
                match wake {
                    Wake::Activated => Ok(Step::Wait(WaitCondition::Event(self.event))),
                    _ => Ok(Step::Done),
                }
            }
        }

        let mut kernel = Kernel::new();
        let ev = kernel.new_event();
        kernel
            .spawn("stuck", Sensitivity::None, Box::new(WaitForever { event: ev }))
            .unwrap();
        let result = kernel.run_to_completion().unwrap();
        assert!(result.deadlocked);
        let diags = kernel.diagnostics().snapshot();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::STARVATION_DEADLOCK);
        assert!(diags[0].notes[0].contains("stuck"));
    }

    #[test]
    fn over_release_flagged_in_strict_mode() {
        struct PutOnce {
            sem: SemaphoreId,
        }
        impl ProcessBody for PutOnce {
            fn resume(&mut self, cx: &mut ProcCtx<'_>, _wake: Wake) -> Result<Step, KernelError> {
                cx.sem_put(self.sem, 2)?;
                Ok(Step::Done)
            }
        }

        let mut kernel = Kernel::new();
        kernel.set_strict(true);
        let sem = kernel.new_semaphore(1);
        kernel
            .spawn("releaser", Sensitivity::None, Box::new(PutOnce { sem }))
            .unwrap();
        kernel.run_to_completion().unwrap();
        assert_eq!(kernel.semaphore(sem).unwrap().available(), 3);
        let diags = kernel.diagnostics().snapshot();
        assert!(diags.iter().any(|d| d.code == codes::SEM_OVER_RELEASE));
    }
}
