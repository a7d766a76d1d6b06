//! A worker's test body trapping must not deadlock the run: its peer is
//! left waiting at the post-barrier and the gate is never halted unless
//! something notices. The engine must surface this as a `RunnerError`
//! carrying whatever histogram was collected before the crash, both for
//! the busy-waiting and the blocking synchroniser.

use phenolphthalein_engine::{CheckPolicy, PermuteKind, Runner, RunnerError, SyncKind};

#[test]
fn a_trapped_worker_ends_the_run_with_an_error_instead_of_hanging_spinner() {
    let module = litmus_tests_demo::trap_probe::module();
    let runner = Runner::new(
        module,
        SyncKind::Spinner,
        PermuteKind::Static,
        CheckPolicy::Report,
        0,
        0,
    )
    .unwrap();

    let err = runner.run().unwrap_err();
    assert!(matches!(err, RunnerError::WorkerPanicked { tid: 1, .. }));
}

#[test]
fn a_trapped_worker_ends_the_run_with_an_error_instead_of_hanging_full_barrier() {
    let module = litmus_tests_demo::trap_probe::module();
    let runner = Runner::new(
        module,
        SyncKind::Barrier,
        PermuteKind::Static,
        CheckPolicy::Report,
        0,
        0,
    )
    .unwrap();

    let err = runner.run().unwrap_err();
    assert!(matches!(err, RunnerError::WorkerPanicked { tid: 1, .. }));
}

#[test]
fn the_panicked_worker_error_carries_the_partial_histogram() {
    let module = litmus_tests_demo::trap_probe::module();
    let runner = Runner::new(
        module,
        SyncKind::Spinner,
        PermuteKind::Static,
        CheckPolicy::Report,
        0,
        0,
    )
    .unwrap();

    match runner.run().unwrap_err() {
        RunnerError::WorkerPanicked {
            partial_total,
            partial_histogram,
            ..
        } => {
            // Thread 1 traps on every iteration before reaching the
            // post-barrier, so no iteration is ever fully observed.
            assert_eq!(partial_total, 0);
            assert!(partial_histogram.is_empty());
        }
        other => panic!("expected WorkerPanicked, got {other:?}"),
    }
}
