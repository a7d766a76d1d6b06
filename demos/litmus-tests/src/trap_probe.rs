//! A two-thread test whose second thread always panics inside its body.
//! Exists to exercise the engine's handling of a worker crash: a run
//! against this module must end with a `RunnerError::WorkerPanicked`
//! carrying whatever histogram was collected before the crash, rather
//! than hanging with thread 0 stranded at the post-barrier forever.

use std::sync::atomic::Ordering;

use phenolphthalein_core::abi::RawEnv;
use phenolphthalein_core::{Manifest, TestModule};

const X: usize = 0;

fn manifest() -> Manifest {
    Manifest {
        n_threads: 2,
        atomic_int32_initials: vec![0],
        atomic_int32_names: vec!["x".into()],
        int32_initials: vec![],
        int32_names: vec![],
    }
}

unsafe extern "C-unwind" fn test(tid: usize, env: *mut RawEnv) {
    let env = unsafe { &*env };
    match tid {
        0 => {
            let cell = unsafe { &*env.atomic_int32.add(X) };
            cell.store(1, Ordering::Relaxed);
        }
        1 => panic!("trap probe: thread 1 always traps"),
        other => unreachable!("trap probe only has threads 0 and 1, got {other}"),
    }
}

unsafe extern "C-unwind" fn check(_env: *const RawEnv) -> bool {
    true
}

pub fn module() -> TestModule {
    TestModule::from_parts(manifest(), test, check)
}
