//! The opaque handle the engine drives: a manifest, a `test(tid, env)`
//! dispatcher, and a `check(env)` postcondition. The engine never
//! interprets test code — it only calls these three entry points.

use crate::abi::{CheckFn, RawEnv, TestFn};
use crate::environment::Environment;
use crate::manifest::Manifest;

/// An already-resolved test module.
///
/// Constructing one is the one place "dynamic loading" (out of scope for
/// this engine) and "statically-linked demo test" (what this repo's own
/// test suite uses) converge: both end up calling [`TestModule::from_parts`]
/// with an owned [`Manifest`] and the two raw function pointers the ABI
/// specifies.
pub struct TestModule {
    manifest: Manifest,
    test_fn: TestFn,
    check_fn: CheckFn,
}

impl TestModule {
    /// Bundles an owned manifest with the two ABI entry points.
    pub fn from_parts(manifest: Manifest, test_fn: TestFn, check_fn: CheckFn) -> TestModule {
        TestModule {
            manifest,
            test_fn,
            check_fn,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Executes `tid`'s body against `env`. Called once per iteration,
    /// between the pre- and post-barrier.
    ///
    /// # Panics
    /// Panics in debug builds if `tid` is out of range; the engine is the
    /// sole assigner of thread ids, so this would indicate an engine bug,
    /// not a bad test. A panic raised by the test body itself is not
    /// caught here — it propagates to the caller, which is expected to
    /// treat a trapped test body as a worker crash rather than let it
    /// escape uncaught.
    pub fn test(&self, tid: usize, env: &Environment) {
        debug_assert!(tid < self.manifest.n_threads, "tid out of range");
        let mut raw: RawEnv = env.as_raw_env();
        // SAFETY: `raw`'s pointers are valid for as long as `env` is
        // alive, which outlives this call; `tid` is in range per the
        // assertion above (or, in release builds, is the engine's own
        // internal invariant).
        unsafe { (self.test_fn)(tid, &mut raw as *mut RawEnv) };
    }

    /// Invokes the postcondition against `env`'s current state.
    /// Called once per iteration, by the post-barrier leader only, after
    /// the post-barrier has established a happens-before edge over the
    /// iteration's test bodies.
    pub fn check(&self, env: &Environment) -> bool {
        let raw: RawEnv = env.as_raw_env();
        // SAFETY: `raw`'s pointers are valid for as long as `env` is alive.
        unsafe { (self.check_fn)(&raw as *const RawEnv) }
    }
}
