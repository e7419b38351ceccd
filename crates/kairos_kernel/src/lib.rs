//! Discrete-event simulation kernel for concurrent hardware processes.
//!
//! The kernel schedules cooperatively interleaved processes over a
//! region-partitioned event queue: within each instant the Active region
//! drains to a fixpoint, then Inactive (`#0` deferrals) promotes, then all
//! nonblocking (NBA) updates commit simultaneously, and only then does time
//! advance. Processes suspend on delays, signal edges, level predicates,
//! named events, semaphores, mailboxes, and fork/join, and resume as
//! explicit state machines — no stack switching, no threads, no locks.
//!
//! # Usage
//!
//! ```ignore
//! use kairos_kernel::{Kernel, Op, Program, Sensitivity};
//!
//! let mut kernel = Kernel::new();
//! let clk = kernel.declare_signal("clk", 1)?;
//! kernel.spawn("tb", Sensitivity::None, Box::new(Program::new(vec![
//!     Op::Delay(5_000_000),
//!     Op::Set { signal: clk, value: LogicVec::from_bool(true) },
//! ])))?;
//! let result = kernel.run_to_completion()?;
//! println!("ended at {}", result.final_time);
//! ```
//!
//! # Modules
//!
//! - `time` — femtosecond simulation clock
//! - `ids` — opaque handles for signals, processes, and sync objects
//! - `event` — region-partitioned event queue
//! - `signal` — 4-state signal store and edge classification
//! - `process` — suspension model, wake payloads, process context
//! - `semaphore`, `mailbox`, `named_event` — synchronization primitives
//! - `program` — scripted resumable process bodies
//! - `kernel` — the scheduler itself
//! - `config` — TOML-loadable kernel configuration
//! - `error` — fatal error types

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod ids;
pub mod kernel;
pub mod mailbox;
pub mod named_event;
pub mod process;
pub mod program;
pub mod semaphore;
pub mod signal;
pub mod time;

pub use config::{load_config, load_config_from_str, ConfigError, KernelConfig};
pub use error::KernelError;
pub use event::{Action, EventQueue, Region, SimEvent};
pub use ids::{EventId, MailboxId, ProcessId, SemaphoreId, SignalId};
pub use kernel::{codes, Kernel, RunResult, StepResult};
pub use mailbox::Mailbox;
pub use named_event::EventState;
pub use process::{
    JoinMode, ProcCtx, ProcessBody, ProcessStatus, Sensitivity, Step, WaitCondition, Wake,
};
pub use program::{ComputeFn, Op, Program};
pub use semaphore::Semaphore;
pub use signal::{EdgeKind, SignalState, SignalStore};
pub use time::SimTime;
