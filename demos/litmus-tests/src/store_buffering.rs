//! The store-buffering (SB) litmus test: the textbook example of a
//! relaxed-memory weak behaviour that sequential consistency forbids.
//!
//! ```text
//! Thread 0: r0 = load(x, relaxed); store(y, 1, relaxed)
//! Thread 1: r0 = load(y, relaxed); store(x, 1, relaxed)
//! ```
//!
//! Under sequential consistency at least one store must be visible to
//! the other thread's load, so `(x,y) == (1,1)` with both loads reading
//! `0` is impossible. Relaxed atomics permit it.

use std::sync::atomic::{AtomicI32, Ordering};

use phenolphthalein_core::abi::RawEnv;
use phenolphthalein_core::{Manifest, TestModule};

const X: usize = 0;
const Y: usize = 1;

fn manifest() -> Manifest {
    Manifest {
        n_threads: 2,
        atomic_int32_initials: vec![0, 0],
        atomic_int32_names: vec!["x".into(), "y".into()],
        int32_initials: vec![0, 0],
        int32_names: vec!["0:r0".into(), "1:r0".into()],
    }
}

unsafe fn atomic(env: &RawEnv, index: usize) -> &AtomicI32 {
    debug_assert!(index < env.n_atomic_int32);
    unsafe { &*env.atomic_int32.add(index) }
}

unsafe extern "C-unwind" fn test(tid: usize, env: *mut RawEnv) {
    let env = unsafe { &*env };
    match tid {
        0 => {
            let r0 = unsafe { atomic(env, X) }.load(Ordering::Relaxed);
            unsafe { atomic(env, Y) }.store(1, Ordering::Relaxed);
            unsafe { *env.int32.add(0) = r0 };
        }
        1 => {
            let r0 = unsafe { atomic(env, Y) }.load(Ordering::Relaxed);
            unsafe { atomic(env, X) }.store(1, Ordering::Relaxed);
            unsafe { *env.int32.add(1) = r0 };
        }
        other => unreachable!("SB test only has threads 0 and 1, got {other}"),
    }
}

/// Accepts exactly the weak behaviour: both stores landed (`x == y == 1`)
/// while neither load observed the other thread's store having already
/// happened (the reads-before-writes interleaving sequential consistency
/// rules out).
unsafe extern "C-unwind" fn check_weak_behaviour(env: *const RawEnv) -> bool {
    let env = unsafe { &*env };
    let x = unsafe { atomic(env, X) }.load(Ordering::Relaxed);
    let y = unsafe { atomic(env, Y) }.load(Ordering::Relaxed);
    let r0_thread0 = unsafe { *env.int32.add(0) };
    let r0_thread1 = unsafe { *env.int32.add(1) };
    x == 1 && y == 1 && matches!((r0_thread0, r0_thread1), (0, 0) | (0, 1) | (1, 0))
}

unsafe extern "C-unwind" fn check_always_true(_env: *const RawEnv) -> bool {
    true
}

unsafe extern "C-unwind" fn check_always_false(_env: *const RawEnv) -> bool {
    false
}

/// The canonical SB test: `check` accepts only the weak behaviour.
pub fn module() -> TestModule {
    TestModule::from_parts(manifest(), test, check_weak_behaviour)
}

/// Identical bodies, but `check` accepts every state. Used to exercise
/// `--check=exit-on-fail` never firing.
pub fn module_always_true() -> TestModule {
    TestModule::from_parts(manifest(), test, check_always_true)
}

/// Identical bodies, but `check` rejects every state. Used to exercise
/// `--check=exit-on-fail` firing on the very first iteration.
pub fn module_always_false() -> TestModule {
    TestModule::from_parts(manifest(), test, check_always_false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use phenolphthalein_core::Environment;

    #[test]
    fn always_true_accepts_the_fresh_initial_state() {
        let m = manifest();
        let env = Environment::new(&m);
        let raw = env.as_raw_env();
        assert!(unsafe { check_always_true(&raw) });
    }

    #[test]
    fn always_false_rejects_the_fresh_initial_state() {
        let m = manifest();
        let env = Environment::new(&m);
        let raw = env.as_raw_env();
        assert!(!unsafe { check_always_false(&raw) });
    }

    #[test]
    fn weak_behaviour_check_rejects_the_fresh_initial_state() {
        // Before either thread runs, x == y == 0, which the weak-behaviour
        // check must reject (it requires x == y == 1).
        let m = manifest();
        let env = Environment::new(&m);
        let raw = env.as_raw_env();
        assert!(!unsafe { check_weak_behaviour(&raw) });
    }

    #[test]
    fn single_threaded_interleaving_produces_the_weak_state() {
        // Run thread 0 fully, then thread 1 fully: this happens to produce
        // x == y == 1 with both threads observing the *other's* pre-store
        // value, i.e. the classic weak behaviour, even serialised.
        let m = manifest();
        let env = Environment::new(&m);
        let raw_ptr = env.as_raw_env();
        unsafe { test(0, &raw_ptr as *const RawEnv as *mut RawEnv) };
        unsafe { test(1, &raw_ptr as *const RawEnv as *mut RawEnv) };
        let raw = env.as_raw_env();
        assert!(unsafe { check_weak_behaviour(&raw) });
    }
}
