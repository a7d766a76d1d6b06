//! Single-thread reseed test. One thread, one atomic cell initialised to
//! 42; the body increments it by one and `check` expects exactly 43.
//! Because the Environment is reseeded to the manifest's initial value
//! before every iteration, this must classify as accepted on every
//! iteration regardless of how many iterations have already run.

use std::sync::atomic::Ordering;

use phenolphthalein_core::abi::RawEnv;
use phenolphthalein_core::{Manifest, TestModule};

const X: usize = 0;

fn manifest() -> Manifest {
    Manifest {
        n_threads: 1,
        atomic_int32_initials: vec![42],
        atomic_int32_names: vec!["x".into()],
        int32_initials: vec![],
        int32_names: vec![],
    }
}

unsafe extern "C-unwind" fn test(tid: usize, env: *mut RawEnv) {
    debug_assert_eq!(tid, 0);
    let env = unsafe { &*env };
    let cell = unsafe { &*env.atomic_int32.add(X) };
    let current = cell.load(Ordering::Relaxed);
    cell.store(current + 1, Ordering::Relaxed);
}

unsafe extern "C-unwind" fn check(env: *const RawEnv) -> bool {
    let env = unsafe { &*env };
    let cell = unsafe { &*env.atomic_int32.add(X) };
    cell.load(Ordering::Relaxed) == 43
}

pub fn module() -> TestModule {
    TestModule::from_parts(manifest(), test, check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use phenolphthalein_core::Environment;

    #[test]
    fn one_increment_from_initial_satisfies_check() {
        let m = manifest();
        let env = Environment::new(&m);
        let raw_ptr = env.as_raw_env();
        unsafe { test(0, &raw_ptr as *const RawEnv as *mut RawEnv) };
        let raw = env.as_raw_env();
        assert!(unsafe { check(&raw) });
    }

    #[test]
    fn reseed_between_iterations_keeps_check_satisfied_every_time() {
        let m = manifest();
        let env = Environment::new(&m);
        for _ in 0..5 {
            let raw_ptr = env.as_raw_env();
            unsafe { test(0, &raw_ptr as *const RawEnv as *mut RawEnv) };
            let raw = env.as_raw_env();
            assert!(unsafe { check(&raw) });
            env.reseed(&m);
        }
    }
}
