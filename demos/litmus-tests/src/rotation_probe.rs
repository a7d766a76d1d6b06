//! Rotation-leak probe. One atomic cell `x` initialised to 7. Each
//! iteration records the value `x` held *before*
//! that iteration's own mutation into a non-atomic observation cell,
//! then bumps `x`. `check` expects the observed value to be 7 on every
//! iteration — proving reseed restores the manifest's initial value both
//! in place (same `Environment`, next iteration) and across a
//! thread-rotation epoch (a freshly allocated `Environment`), since
//! `Environment::reseed` always restores from the manifest, never from a
//! cached prior snapshot.

use std::sync::atomic::Ordering;

use phenolphthalein_core::abi::RawEnv;
use phenolphthalein_core::{Manifest, TestModule};

const X: usize = 0;

fn manifest() -> Manifest {
    Manifest {
        n_threads: 1,
        atomic_int32_initials: vec![7],
        atomic_int32_names: vec!["x".into()],
        int32_initials: vec![0],
        int32_names: vec!["observed_start".into()],
    }
}

unsafe extern "C-unwind" fn test(tid: usize, env: *mut RawEnv) {
    debug_assert_eq!(tid, 0);
    let env = unsafe { &*env };
    let cell = unsafe { &*env.atomic_int32.add(X) };
    let observed = cell.load(Ordering::Relaxed);
    unsafe { *env.int32.add(0) = observed };
    cell.store(observed + 1, Ordering::Relaxed);
}

unsafe extern "C-unwind" fn check(env: *const RawEnv) -> bool {
    let env = unsafe { &*env };
    unsafe { *env.int32.add(0) == 7 }
}

pub fn module() -> TestModule {
    TestModule::from_parts(manifest(), test, check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use phenolphthalein_core::Environment;

    #[test]
    fn every_reseeded_iteration_observes_the_manifest_initial() {
        let m = manifest();
        let env = Environment::new(&m);
        for _ in 0..10 {
            let raw_ptr = env.as_raw_env();
            unsafe { test(0, &raw_ptr as *const RawEnv as *mut RawEnv) };
            let raw = env.as_raw_env();
            assert!(unsafe { check(&raw) });
            env.reseed(&m);
        }
    }

    #[test]
    fn a_fresh_environment_after_rotation_observes_the_same_initial() {
        let m = manifest();
        let first_epoch = Environment::new(&m);
        let raw_ptr = first_epoch.as_raw_env();
        unsafe { test(0, &raw_ptr as *const RawEnv as *mut RawEnv) };
        // Rotation drops the old `Environment` and allocates a new one
        // rather than reseeding in place.
        let second_epoch = Environment::new(&m);
        let raw_ptr = second_epoch.as_raw_env();
        unsafe { test(0, &raw_ptr as *const RawEnv as *mut RawEnv) };
        let raw = second_epoch.as_raw_env();
        assert!(unsafe { check(&raw) });
    }
}
