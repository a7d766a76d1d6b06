//! Cross-thread barrier used at the start and end of every iteration to
//! line up threads as closely as possible, and to elect exactly one
//! leader per phase.
//!
//! Two implementations share one contract: `Spinner` busy-waits on an
//! atomic generation counter (low release latency, surfaces more weak
//! behaviours); `FullBarrier` blocks on a condition variable (higher
//! release latency, doesn't burn cores). The engine treats them as
//! interchangeable — neither is a drop-in replacement for the other,
//! they are two different experiments over the same contract.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

/// What a [`Synchroniser::wait`] call resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// Exactly one participant per phase is told this (the leader).
    Leader,
    /// Every other participant.
    Follower,
    /// A peer never arrived — [`Synchroniser::poison`] was called while
    /// this caller was blocked, or had already been called before it
    /// arrived. No leader is elected for a broken phase.
    Broken,
}

/// `wait` is called once per phase per participant; phases alternate
/// pre/post for the lifetime of the caller. On release, exactly one
/// participant per phase gets [`WaitResult::Leader`] (unless the phase is
/// broken); the rest get [`WaitResult::Follower`]. Implementations may
/// rotate which participant is elected leader across phases; they must
/// never elect more or fewer than one for a phase that isn't broken.
///
/// A test body that traps mid-iteration never reaches the following
/// `wait` call, which would otherwise strand every peer already blocked
/// in it. [`Synchroniser::poison`] exists for exactly that case: it
/// releases every current and future waiter with [`WaitResult::Broken`]
/// instead of leaving them parked forever.
pub trait Synchroniser: Send + Sync {
    fn wait(&self, tid: usize) -> WaitResult;

    /// Releases every participant currently or later blocked in `wait`
    /// with [`WaitResult::Broken`]. Idempotent; safe to call more than
    /// once or from more than one thread.
    fn poison(&self);
}

/// Busy-waiting barrier over an atomic generation counter.
///
/// # Protocol
/// Each caller increments an arrival counter; whichever call observes
/// the counter reach `n_threads` is the leader for this phase — it resets
/// the arrival counter and bumps the generation counter, which releases
/// every follower spinning on it. This is the same odd/even-generation
/// shape as a seqlock's sequence number: followers spin reading the
/// generation with `Acquire` until it no longer equals the value they
/// observed on entry, or until the poison flag is set.
pub struct Spinner {
    n_threads: usize,
    generation: AtomicUsize,
    arrived: AtomicUsize,
    poisoned: AtomicBool,
}

impl Spinner {
    pub fn new(n_threads: usize) -> Spinner {
        Spinner {
            n_threads,
            generation: AtomicUsize::new(0),
            arrived: AtomicUsize::new(0),
            poisoned: AtomicBool::new(false),
        }
    }
}

impl Synchroniser for Spinner {
    fn wait(&self, _tid: usize) -> WaitResult {
        if self.poisoned.load(Ordering::Acquire) {
            return WaitResult::Broken;
        }

        let local_generation = self.generation.load(Ordering::Acquire);
        let arrived = self.arrived.fetch_add(1, Ordering::AcqRel) + 1;

        if arrived == self.n_threads {
            // Last arriver: reset for the next phase and release everyone
            // spinning on `generation`, ourselves included.
            self.arrived.store(0, Ordering::Relaxed);
            self.generation.fetch_add(1, Ordering::Release);
            WaitResult::Leader
        } else {
            loop {
                if self.poisoned.load(Ordering::Acquire) {
                    return WaitResult::Broken;
                }
                if self.generation.load(Ordering::Acquire) != local_generation {
                    return WaitResult::Follower;
                }
                std::hint::spin_loop();
            }
        }
    }

    fn poison(&self) {
        self.poisoned.store(true, Ordering::Release);
    }
}

struct BarrierState {
    count: usize,
    generation: usize,
    poisoned: bool,
}

/// Blocking barrier over a `Mutex`/`Condvar` pair. Higher release latency
/// than [`Spinner`], but doesn't burn a core while waiting. Built by hand
/// rather than over `std::sync::Barrier`, which has no way to release
/// waiters that never reach the expected count — exactly what a trapped
/// peer needs.
pub struct FullBarrier {
    n_threads: usize,
    state: Mutex<BarrierState>,
    condvar: Condvar,
}

impl FullBarrier {
    pub fn new(n_threads: usize) -> FullBarrier {
        FullBarrier {
            n_threads,
            state: Mutex::new(BarrierState {
                count: 0,
                generation: 0,
                poisoned: false,
            }),
            condvar: Condvar::new(),
        }
    }
}

impl Synchroniser for FullBarrier {
    fn wait(&self, _tid: usize) -> WaitResult {
        let mut state = self.state.lock().unwrap();
        if state.poisoned {
            return WaitResult::Broken;
        }

        let local_generation = state.generation;
        state.count += 1;

        if state.count == self.n_threads {
            state.count = 0;
            state.generation = state.generation.wrapping_add(1);
            self.condvar.notify_all();
            WaitResult::Leader
        } else {
            while !state.poisoned && state.generation == local_generation {
                state = self.condvar.wait(state).unwrap();
            }
            if state.poisoned {
                WaitResult::Broken
            } else {
                WaitResult::Follower
            }
        }
    }

    fn poison(&self) {
        let mut state = self.state.lock().unwrap();
        state.poisoned = true;
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::thread;
    use std::time::Duration;

    fn exactly_one_leader_per_phase<S: Synchroniser + 'static>(make: impl Fn(usize) -> S) {
        const N: usize = 8;
        const PHASES: usize = 50;
        let sync = Arc::new(make(N));
        let leader_count = Arc::new(Counter::new(0));

        let handles: Vec<_> = (0..N)
            .map(|tid| {
                let sync = Arc::clone(&sync);
                let leader_count = Arc::clone(&leader_count);
                thread::spawn(move || {
                    for _ in 0..PHASES {
                        if sync.wait(tid) == WaitResult::Leader {
                            leader_count.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(leader_count.load(Ordering::SeqCst), PHASES);
    }

    #[test]
    fn spinner_elects_exactly_one_leader_per_phase() {
        exactly_one_leader_per_phase(Spinner::new);
    }

    #[test]
    fn full_barrier_elects_exactly_one_leader_per_phase() {
        exactly_one_leader_per_phase(FullBarrier::new);
    }

    #[test]
    fn single_thread_is_always_its_own_leader() {
        let sync = Spinner::new(1);
        assert_eq!(sync.wait(0), WaitResult::Leader);
        assert_eq!(sync.wait(0), WaitResult::Leader);
    }

    fn poison_releases_every_stranded_peer<S: Synchroniser + 'static>(make: impl Fn(usize) -> S) {
        const N: usize = 4;
        let sync = Arc::new(make(N));
        let broken_count = Arc::new(Counter::new(0));

        // Only N - 1 threads ever call `wait`, simulating the Nth peer
        // having trapped before reaching it.
        let handles: Vec<_> = (0..N - 1)
            .map(|tid| {
                let sync = Arc::clone(&sync);
                let broken_count = Arc::clone(&broken_count);
                thread::spawn(move || {
                    if sync.wait(tid) == WaitResult::Broken {
                        broken_count.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        sync.poison();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(broken_count.load(Ordering::SeqCst), N - 1);
        // A poisoned synchroniser stays broken for anyone arriving late.
        assert_eq!(sync.wait(0), WaitResult::Broken);
    }

    #[test]
    fn spinner_poison_releases_every_stranded_peer() {
        poison_releases_every_stranded_peer(Spinner::new);
    }

    #[test]
    fn full_barrier_poison_releases_every_stranded_peer() {
        poison_releases_every_stranded_peer(FullBarrier::new);
    }
}
