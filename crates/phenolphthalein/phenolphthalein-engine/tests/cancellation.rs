//! External cancellation must drain cleanly with a partial histogram
//! rather than losing data. The flag is raised from
//! a second thread shortly after the run starts rather than before it,
//! exercising the same mid-run path a delivered signal would, and the
//! run must stop without any worker hanging at a barrier a peer never
//! reaches.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use phenolphthalein_engine::{CheckPolicy, PermuteKind, RunOutcome, Runner, SyncKind};

#[test]
fn cancellation_drains_a_partial_histogram_without_error() {
    let module = litmus_tests_demo::store_buffering::module();
    let runner = Runner::new(
        module,
        SyncKind::Spinner,
        PermuteKind::Random,
        CheckPolicy::Report,
        0, // unbounded: only cancellation ends this run
        0,
    )
    .unwrap();

    let cancellation = runner.cancellation_handle();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        cancellation.store(true, Ordering::Relaxed);
    });

    let report = runner.run().unwrap();
    canceller.join().unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert!(report.total > 0, "at least one iteration should have completed before cancel");
}
