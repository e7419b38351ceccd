//! Fork/join semantics: join policies, child timing relative to the fork
//! instant, and child ownership after detach.

use kairos_common::LogicVec;
use kairos_conformance::{bit0, spawn_prog};
use kairos_kernel::{JoinMode, Kernel, Op, ProcessStatus, Program, SimTime};

/// Join-all blocks the parent until every child has finished.
#[test]
fn join_all_waits_for_slowest_child() {
    let mut kernel = Kernel::new();
    spawn_prog(
        &mut kernel,
        "parent",
        vec![
            Op::Fork {
                children: vec![
                    Program::new(vec![
                        Op::Delay(SimTime::from_ns(5).fs),
                        Op::Display("fast".into()),
                    ]),
                    Program::new(vec![
                        Op::Delay(SimTime::from_ns(10).fs),
                        Op::Display("slow".into()),
                    ]),
                ],
                mode: JoinMode::All,
            },
            Op::Display("joined".into()),
        ],
    )
    .unwrap();

    let result = kernel.run_to_completion().unwrap();
    assert_eq!(result.display_output, vec!["fast", "slow", "joined"]);
    assert_eq!(result.final_time, SimTime::from_ns(10));
}

/// Join-any resumes the parent on the first finished child; the others keep
/// running, owned by the process table.
#[test]
fn join_any_resumes_on_first_child() {
    let mut kernel = Kernel::new();
    spawn_prog(
        &mut kernel,
        "parent",
        vec![
            Op::Fork {
                children: vec![
                    Program::new(vec![
                        Op::Delay(SimTime::from_ns(5).fs),
                        Op::Display("fast".into()),
                    ]),
                    Program::new(vec![
                        Op::Delay(SimTime::from_ns(10).fs),
                        Op::Display("slow".into()),
                    ]),
                ],
                mode: JoinMode::Any,
            },
            Op::Display("joined".into()),
        ],
    )
    .unwrap();

    let result = kernel.run_to_completion().unwrap();
    assert_eq!(result.display_output, vec!["fast", "joined", "slow"]);
    // The detached child still ran to its end.
    assert_eq!(result.final_time, SimTime::from_ns(10));
    assert!(!result.deadlocked);
}

/// Join-none does not block at all: the parent's next statement runs before
/// any child makes progress past its first suspension.
#[test]
fn join_none_continues_immediately() {
    let mut kernel = Kernel::new();
    let parent = spawn_prog(
        &mut kernel,
        "parent",
        vec![
            Op::Fork {
                children: vec![Program::new(vec![
                    Op::Delay(SimTime::from_ns(5).fs),
                    Op::Display("child".into()),
                ])],
                mode: JoinMode::None,
            },
            Op::Display("parent".into()),
        ],
    )
    .unwrap();

    let result = kernel.run_to_completion().unwrap();
    assert_eq!(result.display_output, vec!["parent", "child"]);
    assert_eq!(kernel.process_status(parent), Some(ProcessStatus::Finished));
}

/// A child forked at t delays relative to t, not relative to time zero.
#[test]
fn child_delays_are_relative_to_fork_instant() {
    let mut kernel = Kernel::new();
    let done = bit0(&mut kernel, "done");
    spawn_prog(
        &mut kernel,
        "parent",
        vec![
            Op::Delay(SimTime::from_ns(10).fs),
            Op::Fork {
                children: vec![Program::new(vec![
                    Op::Delay(SimTime::from_ns(5).fs),
                    Op::Set {
                        signal: done,
                        value: LogicVec::from_bool(true),
                    },
                ])],
                mode: JoinMode::All,
            },
        ],
    )
    .unwrap();

    let result = kernel.run_to_completion().unwrap();
    // 10 ns to the fork plus the child's 5 ns.
    assert_eq!(result.final_time, SimTime::from_ns(15));
    assert_eq!(kernel.signal_value(done).to_u64(), Some(1));
}

/// Nested forks: each level's delays stack on the instant its fork ran.
#[test]
fn nested_forks_stack_relative_delays() {
    let mut kernel = Kernel::new();
    spawn_prog(
        &mut kernel,
        "outer",
        vec![
            Op::Delay(SimTime::from_ns(3).fs),
            Op::Fork {
                children: vec![Program::new(vec![
                    Op::Delay(SimTime::from_ns(4).fs),
                    Op::Fork {
                        children: vec![Program::new(vec![
                            Op::Delay(SimTime::from_ns(5).fs),
                            Op::Display("leaf".into()),
                        ])],
                        mode: JoinMode::All,
                    },
                ])],
                mode: JoinMode::All,
            },
            Op::Display("outer done".into()),
        ],
    )
    .unwrap();

    let result = kernel.run_to_completion().unwrap();
    assert_eq!(result.display_output, vec!["leaf", "outer done"]);
    assert_eq!(result.final_time, SimTime::from_ns(12));
}

/// A join over already-finished children does not block.
#[test]
fn join_all_with_finished_children_is_immediate() {
    let mut kernel = Kernel::new();
    spawn_prog(
        &mut kernel,
        "parent",
        vec![
            Op::Fork {
                // The child finishes within the fork instant.
                children: vec![Program::new(vec![Op::Display("child".into())])],
                mode: JoinMode::All,
            },
            Op::Display("joined".into()),
        ],
    )
    .unwrap();
    let result = kernel.run_to_completion().unwrap();
    assert_eq!(result.display_output, vec!["child", "joined"]);
    assert_eq!(result.final_time, SimTime::zero());
}
