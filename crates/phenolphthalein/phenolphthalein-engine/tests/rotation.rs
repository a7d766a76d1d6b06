//! Thread rotation must not leak state across epochs. The rotation
//! probe records, every iteration, the value its
//! one atomic cell held *before* that iteration's mutation; `check`
//! requires it to equal the manifest's initial value (7) on every single
//! iteration, whether or not a rotation just happened.

use phenolphthalein_core::Outcome;
use phenolphthalein_engine::{CheckPolicy, PermuteKind, RunOutcome, Runner, SyncKind};

#[test]
fn rotation_never_leaks_state_across_epoch_boundaries() {
    let module = litmus_tests_demo::rotation_probe::module();
    let runner = Runner::new(
        module,
        SyncKind::Spinner,
        PermuteKind::Static,
        CheckPolicy::Report,
        3_000,
        500,
    )
    .unwrap();

    let report = runner.run().unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.total, 3_000);
    for (_, outcome) in report.histogram.values() {
        assert_eq!(*outcome, Outcome::Accepted);
    }
}
