//! Scripted process bodies.
//!
//! A [`Program`] is a list of [`Op`]s interpreted as a resumable state
//! machine: the interpreter keeps a frame stack and a program counter, so a
//! suspension in the middle of a loop resumes exactly where it left off.
//! This is the shape a front end would compile process bodies into, and what
//! the conformance suite drives the kernel with. Statements execute in
//! lexical order; the only yield points are the explicit wait ops.

use kairos_common::LogicVec;

use crate::error::KernelError;
use crate::ids::{EventId, MailboxId, SemaphoreId, SignalId};
use crate::process::{JoinMode, ProcCtx, ProcessBody, Step, WaitCondition, Wake};
use crate::signal::{EdgeKind, SignalStore};

/// A pure combinational function over signal values.
pub type ComputeFn = fn(&[LogicVec]) -> LogicVec;

/// One scripted statement.
#[derive(Clone)]
pub enum Op {
    /// Blocking write of a constant.
    Set {
        /// Target signal.
        signal: SignalId,
        /// Value to commit.
        value: LogicVec,
    },
    /// Blocking copy: reads `from` now, commits to `to` immediately.
    Copy {
        /// Source signal.
        from: SignalId,
        /// Target signal.
        to: SignalId,
    },
    /// Nonblocking write of a constant, applying after `delay_fs` (0 = this
    /// instant's NBA phase).
    SetNb {
        /// Target signal.
        signal: SignalId,
        /// Value captured now.
        value: LogicVec,
        /// NBA apply delay in femtoseconds.
        delay_fs: u64,
    },
    /// Nonblocking copy: reads `from` now, applies to `to` in the NBA phase.
    CopyNb {
        /// Source signal.
        from: SignalId,
        /// Target signal.
        to: SignalId,
    },
    /// Blocking write of a computed value.
    Compute {
        /// Target signal.
        target: SignalId,
        /// Signals read as arguments, in order.
        sources: Vec<SignalId>,
        /// The combinational function.
        op: ComputeFn,
    },
    /// Suspend for `0` femtoseconds (this instant's Inactive region) or a
    /// positive delay.
    Delay(u64),
    /// Suspend until an edge of `signal`.
    WaitEdge {
        /// Watched signal.
        signal: SignalId,
        /// Transition kind.
        edge: EdgeKind,
    },
    /// Suspend until `signal` equals `value` (level-triggered).
    WaitUntil {
        /// Watched signal.
        signal: SignalId,
        /// Value the signal must reach.
        value: LogicVec,
    },
    /// Suspend until the named event triggers.
    WaitEvent(EventId),
    /// Trigger a named event.
    Trigger(EventId),
    /// Blocking write of the event's triggered flag into a 1-bit signal.
    SampleEvent {
        /// The event to sample.
        event: EventId,
        /// Target 1-bit signal.
        into: SignalId,
    },
    /// Suspend until `count` resources are acquired.
    SemGet {
        /// The semaphore.
        sem: SemaphoreId,
        /// Resources to take.
        count: u32,
    },
    /// Release `count` resources.
    SemPut {
        /// The semaphore.
        sem: SemaphoreId,
        /// Resources to return.
        count: u32,
    },
    /// Blocking mailbox send of a [`LogicVec`] message.
    MbPut {
        /// The mailbox.
        mailbox: MailboxId,
        /// The message value.
        value: LogicVec,
    },
    /// Blocking mailbox receive; the message lands in `into`.
    MbGet {
        /// The mailbox.
        mailbox: MailboxId,
        /// Signal receiving the message value.
        into: SignalId,
    },
    /// Fork child programs and optionally join them.
    Fork {
        /// The children, started at the current instant.
        children: Vec<Program>,
        /// Join policy; `None` continues immediately.
        mode: JoinMode,
    },
    /// Run `body` `count` times.
    Repeat {
        /// Iteration count.
        count: u32,
        /// The loop body.
        body: Vec<Op>,
    },
    /// Append a literal line to the display output.
    Display(String),
    /// Append `label` followed by the signal's current value.
    DisplayValue {
        /// Prefix text.
        label: String,
        /// Signal whose value is shown.
        signal: SignalId,
    },
    /// Request termination of the run and end this process.
    Finish,
}

#[derive(Clone)]
struct Frame {
    ops: Vec<Op>,
    pc: usize,
    iterations_left: Option<u32>,
}

enum OnWake {
    StoreMessage(SignalId),
}

/// A scripted, resumable process body.
pub struct Program {
    root: Vec<Op>,
    frames: Vec<Frame>,
    pending: Option<OnWake>,
}

impl Program {
    /// Creates a program from its statement list.
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            frames: vec![Frame {
                ops: ops.clone(),
                pc: 0,
                iterations_left: None,
            }],
            root: ops,
            pending: None,
        }
    }

    fn rewind(&mut self) {
        self.frames = vec![Frame {
            ops: self.root.clone(),
            pc: 0,
            iterations_left: None,
        }];
        self.pending = None;
    }

    fn absorb_wake(&mut self, cx: &mut ProcCtx<'_>, wake: Wake) -> Result<(), KernelError> {
        match (self.pending.take(), wake) {
            (Some(OnWake::StoreMessage(into)), Wake::MailboxMessage(message)) => {
                let value = message
                    .downcast::<LogicVec>()
                    .map_err(|_| KernelError::MailboxTypeMismatch)?;
                cx.write(into, *value)
            }
            (Some(OnWake::StoreMessage(_)), _) => Err(KernelError::Internal {
                reason: "mailbox receive resumed without a message".into(),
            }),
            (None, _) => Ok(()),
        }
    }
}

/// Cloning a program clones the script, not the execution state: the clone
/// starts from the top. This is what `Fork` relies on.
impl Clone for Program {
    fn clone(&self) -> Self {
        Self::new(self.root.clone())
    }
}

impl ProcessBody for Program {
    fn resume(&mut self, cx: &mut ProcCtx<'_>, wake: Wake) -> Result<Step, KernelError> {
        self.absorb_wake(cx, wake)?;
        loop {
            let op = {
                let Some(frame) = self.frames.last_mut() else {
                    self.rewind();
                    return Ok(Step::Done);
                };
                if frame.pc >= frame.ops.len() {
                    match frame.iterations_left {
                        Some(n) if n > 1 => {
                            frame.iterations_left = Some(n - 1);
                            frame.pc = 0;
                            continue;
                        }
                        _ => {
                            self.frames.pop();
                            continue;
                        }
                    }
                }
                let op = frame.ops[frame.pc].clone();
                frame.pc += 1;
                op
            };

            match op {
                Op::Set { signal, value } => cx.write(signal, value)?,
                Op::Copy { from, to } => {
                    let value = cx.read(from)?;
                    cx.write(to, value)?;
                }
                Op::SetNb {
                    signal,
                    value,
                    delay_fs,
                } => cx.write_nonblocking_delayed(signal, value, delay_fs)?,
                Op::CopyNb { from, to } => {
                    let value = cx.read(from)?;
                    cx.write_nonblocking(to, value)?;
                }
                Op::Compute {
                    target,
                    sources,
                    op,
                } => {
                    let args = sources
                        .iter()
                        .map(|s| cx.read(*s))
                        .collect::<Result<Vec<_>, _>>()?;
                    cx.write(target, op(&args))?;
                }
                Op::Delay(delay_fs) => return Ok(Step::Wait(WaitCondition::Delay(delay_fs))),
                Op::WaitEdge { signal, edge } => {
                    return Ok(Step::Wait(WaitCondition::Edge { signal, edge }));
                }
                Op::WaitUntil { signal, value } => {
                    let predicate =
                        Box::new(move |store: &SignalStore| *store.value(signal) == value);
                    return Ok(Step::Wait(WaitCondition::Level {
                        watch: vec![signal],
                        predicate,
                    }));
                }
                Op::WaitEvent(event) => return Ok(Step::Wait(WaitCondition::Event(event))),
                Op::Trigger(event) => cx.event_trigger(event)?,
                Op::SampleEvent { event, into } => {
                    let triggered = cx.event_triggered(event)?;
                    cx.write(into, LogicVec::from_bool(triggered))?;
                }
                Op::SemGet { sem, count } => {
                    return Ok(Step::Wait(WaitCondition::SemAcquire { sem, count }));
                }
                Op::SemPut { sem, count } => cx.sem_put(sem, count)?,
                Op::MbPut { mailbox, value } => {
                    return Ok(Step::Wait(WaitCondition::MailboxPut {
                        mailbox,
                        message: Box::new(value),
                    }));
                }
                Op::MbGet { mailbox, into } => {
                    self.pending = Some(OnWake::StoreMessage(into));
                    return Ok(Step::Wait(WaitCondition::MailboxGet { mailbox }));
                }
                Op::Fork { children, mode } => {
                    let bodies: Vec<Box<dyn ProcessBody>> = children
                        .into_iter()
                        .map(|child| Box::new(child) as Box<dyn ProcessBody>)
                        .collect();
                    let ids = cx.fork(bodies)?;
                    if mode != JoinMode::None {
                        return Ok(Step::Wait(WaitCondition::Join {
                            children: ids,
                            mode,
                        }));
                    }
                }
                Op::Repeat { count, body } => {
                    if count > 0 {
                        self.frames.push(Frame {
                            ops: body,
                            pc: 0,
                            iterations_left: Some(count),
                        });
                    }
                }
                Op::Display(text) => cx.display(text),
                Op::DisplayValue { label, signal } => {
                    let value = cx.read(signal)?;
                    cx.display(format!("{label}{value}"));
                }
                Op::Finish => {
                    cx.finish();
                    self.rewind();
                    return Ok(Step::Done);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;
    use crate::process::Sensitivity;

    #[test]
    fn blocking_statements_chain_sequentially() {
        let mut kernel = Kernel::new();
        let a = kernel
            .declare_signal_init("a", LogicVec::from_bool(false))
            .unwrap();
        let b = kernel
            .declare_signal_init("b", LogicVec::from_bool(true))
            .unwrap();
        kernel
            .spawn(
                "chain",
                Sensitivity::None,
                Box::new(Program::new(vec![
                    Op::Copy { from: b, to: a },
                    Op::Copy { from: a, to: b },
                ])),
            )
            .unwrap();
        kernel.run_to_completion().unwrap();
        // a = b gives a = 1, then b = a reads the fresh 1.
        assert_eq!(kernel.signal_value(a).to_u64(), Some(1));
        assert_eq!(kernel.signal_value(b).to_u64(), Some(1));
    }

    #[test]
    fn repeat_runs_body_count_times() {
        let mut kernel = Kernel::new();
        let s = kernel
            .declare_signal_init("s", LogicVec::from_bool(false))
            .unwrap();
        kernel
            .spawn(
                "looper",
                Sensitivity::None,
                Box::new(Program::new(vec![Op::Repeat {
                    count: 3,
                    body: vec![
                        Op::DisplayValue {
                            label: "tick ".into(),
                            signal: s,
                        },
                        Op::Delay(1_000),
                    ],
                }])),
            )
            .unwrap();
        let result = kernel.run_to_completion().unwrap();
        assert_eq!(result.display_output.len(), 3);
        // Three 1 ps delays.
        assert_eq!(result.final_time.fs, 3_000);
    }

    #[test]
    fn finish_ends_run_immediately() {
        let mut kernel = Kernel::new();
        let s = kernel
            .declare_signal_init("s", LogicVec::from_bool(false))
            .unwrap();
        kernel
            .spawn(
                "stopper",
                Sensitivity::None,
                Box::new(Program::new(vec![
                    Op::Set {
                        signal: s,
                        value: LogicVec::from_bool(true),
                    },
                    Op::Finish,
                    Op::Set {
                        signal: s,
                        value: LogicVec::from_bool(false),
                    },
                ])),
            )
            .unwrap();
        let result = kernel.run_to_completion().unwrap();
        assert!(result.finished_by_user);
        // The statement after Finish never ran.
        assert_eq!(kernel.signal_value(s).to_u64(), Some(1));
    }

    #[test]
    fn clone_resets_execution_state() {
        let mut program = Program::new(vec![Op::Delay(5)]);
        program.frames[0].pc = 1;
        let copy = program.clone();
        assert_eq!(copy.frames[0].pc, 0);
        assert_eq!(copy.frames.len(), 1);
    }

    #[test]
    fn delay_then_write_resumes_in_place() {
        let mut kernel = Kernel::new();
        let s = kernel
            .declare_signal_init("s", LogicVec::from_bool(false))
            .unwrap();
        kernel
            .spawn(
                "waiter",
                Sensitivity::None,
                Box::new(Program::new(vec![
                    Op::Delay(2_000_000),
                    Op::Set {
                        signal: s,
                        value: LogicVec::from_bool(true),
                    },
                ])),
            )
            .unwrap();
        let result = kernel.run_to_completion().unwrap();
        assert_eq!(result.final_time.to_ns(), 2);
        assert_eq!(kernel.signal_value(s).to_u64(), Some(1));
    }
}
