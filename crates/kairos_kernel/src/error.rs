//! Kernel error types.
//!
//! Fatal conditions abort the run through [`KernelError`]. Survivable
//! conditions (failed `try_*` calls, starvation deadlock) are reported as
//! return values or diagnostics instead, so one process's mistake never
//! tears down its neighbors.

/// Errors that abort simulation construction or execution.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// A signal or process was registered under a name that is already taken.
    #[error("duplicate name '{name}'")]
    DuplicateName {
        /// The contested name.
        name: String,
    },

    /// An operation referenced a handle the kernel never issued.
    #[error("unknown {kind} handle #{index}")]
    UnknownHandle {
        /// What kind of handle ("signal", "process", ...).
        kind: &'static str,
        /// The raw index of the bad handle.
        index: u32,
    },

    /// A write carried a value of the wrong width for its target signal.
    #[error("width mismatch on '{signal}': declared {declared}, written {written}")]
    WidthMismatch {
        /// The signal's registered name.
        signal: String,
        /// The declared width in bits.
        declared: u32,
        /// The width of the value that was written.
        written: u32,
    },

    /// A typed mailbox receive found a message of a different shape.
    #[error("mailbox message type mismatch")]
    MailboxTypeMismatch,

    /// A single instant kept generating work past the configured bound,
    /// which indicates a zero-delay loop.
    #[error("slot iteration limit exceeded at {time_fs} fs (max {limit})")]
    SlotIterationLimit {
        /// The stuck instant, in femtoseconds.
        time_fs: u64,
        /// The configured iteration bound.
        limit: u32,
    },

    /// The kernel reached a state its own invariants forbid.
    #[error("internal kernel error: {reason}")]
    Internal {
        /// What went wrong.
        reason: String,
    },
}
