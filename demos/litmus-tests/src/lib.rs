//! Statically-linked demo litmus tests implementing the engine's
//! test-module ABI (`phenolphthalein_core::TestModule`). Dynamic-library
//! loading is out of scope for the engine, so these are the test
//! modules the CLI's `--test=` flag and the engine's own integration
//! tests select from.

pub mod reseed_counter;
pub mod rotation_probe;
pub mod store_buffering;
pub mod trap_probe;

use phenolphthalein_core::TestModule;

/// Every demo test's registry name, as accepted by `--test=`.
pub const NAMES: &[&str] = &[
    "sb",
    "sb-always-true",
    "sb-always-false",
    "reseed-counter",
    "rotation-probe",
    "trap-probe",
];

/// Looks up a demo test module by its registry name.
pub fn by_name(name: &str) -> Option<TestModule> {
    match name {
        "sb" => Some(store_buffering::module()),
        "sb-always-true" => Some(store_buffering::module_always_true()),
        "sb-always-false" => Some(store_buffering::module_always_false()),
        "reseed-counter" => Some(reseed_counter::module()),
        "rotation-probe" => Some(rotation_probe::module()),
        "trap-probe" => Some(trap_probe::module()),
        _ => None,
    }
}
