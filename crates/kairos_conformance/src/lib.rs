//! Shared helpers for the kernel conformance suite.
//!
//! The actual scenarios live in `tests/`: region/NBA semantics in
//! `regions.rs`, synchronization primitives in `sync.rs`, and fork/join in
//! `fork_join.rs`. This library only carries the small builders they share.

use kairos_common::LogicVec;
use kairos_kernel::{Kernel, KernelError, Op, Program, Sensitivity, SignalId};

/// Declares a 1-bit signal initialized to 0.
pub fn bit0(kernel: &mut Kernel, name: &str) -> SignalId {
    kernel
        .declare_signal_init(name, LogicVec::from_bool(false))
        .expect("declare")
}

/// Declares a 1-bit signal initialized to 1.
pub fn bit1(kernel: &mut Kernel, name: &str) -> SignalId {
    kernel
        .declare_signal_init(name, LogicVec::from_bool(true))
        .expect("declare")
}

/// Declares a 1-bit signal left at X.
pub fn bitx(kernel: &mut Kernel, name: &str) -> SignalId {
    kernel.declare_signal(name, 1).expect("declare")
}

/// Declares an 8-bit signal with an initial value.
pub fn byte(kernel: &mut Kernel, name: &str, value: u64) -> SignalId {
    kernel
        .declare_signal_init(name, LogicVec::from_u64(value, 8))
        .expect("declare")
}

/// Spawns a one-shot scripted process.
pub fn spawn_prog(
    kernel: &mut Kernel,
    name: &str,
    ops: Vec<Op>,
) -> Result<kairos_kernel::ProcessId, KernelError> {
    kernel.spawn(name, Sensitivity::None, Box::new(Program::new(ops)))
}

/// The 1-bit value of a signal, which must be definite.
pub fn bit_of(kernel: &Kernel, signal: SignalId) -> u64 {
    kernel
        .signal_value(signal)
        .to_u64()
        .expect("signal holds X/Z")
}
