//! Per-epoch release-order gate: the mechanism through which the
//! Permuter's output actually affects the order threads pass through the
//! pre-barrier's release point.
//!
//! A `Synchroniser::wait` call on its own cannot express "release thread
//! 3 before thread 1" — a barrier releases everyone at once. So each
//! worker, before calling `wait` for the pre-barrier, takes a ticket from
//! this gate; tickets are handed out strictly in the permutation's order,
//! staggering *entry* into the barrier call even though the barrier's own
//! release remains simultaneous. The post-barrier leader publishes the
//! next iteration's order here, piggy-backing the handoff on a
//! generation counter identical in shape to `Spinner`'s.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct IterationGate {
    rank_of_tid: Box<[AtomicUsize]>,
    next_rank: AtomicUsize,
    generation: AtomicUsize,
    halted: AtomicBool,
}

impl IterationGate {
    /// Builds the gate already holding the first iteration's order.
    pub fn new(order: &[usize]) -> IterationGate {
        let rank_of_tid: Vec<AtomicUsize> =
            (0..order.len()).map(|_| AtomicUsize::new(0)).collect();
        let gate = IterationGate {
            rank_of_tid: rank_of_tid.into_boxed_slice(),
            next_rank: AtomicUsize::new(0),
            generation: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
        };
        gate.publish(order);
        gate
    }

    /// Leader-only. Publishes the release order for the iteration about
    /// to start and wakes every worker currently parked in
    /// [`Self::await_turn`].
    pub fn publish(&self, order: &[usize]) {
        for (rank, &tid) in order.iter().enumerate() {
            self.rank_of_tid[tid].store(rank, Ordering::Relaxed);
        }
        self.next_rank.store(0, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Stops the gate permanently; every parked and future caller of
    /// [`Self::await_turn`] returns `false` instead of blocking.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Blocks `tid` until it is its turn to proceed to the pre-barrier.
    /// `seen_generation` is this caller's private bookkeeping, carried
    /// across calls; returns `false` (without blocking further) once the
    /// gate has been halted.
    pub fn await_turn(&self, tid: usize, seen_generation: &mut usize) -> bool {
        loop {
            if self.halted.load(Ordering::Acquire) {
                return false;
            }
            let generation = self.generation.load(Ordering::Acquire);
            if generation != *seen_generation {
                *seen_generation = generation;
                break;
            }
            std::hint::spin_loop();
        }

        let my_rank = self.rank_of_tid[tid].load(Ordering::Relaxed);
        loop {
            if self.halted.load(Ordering::Acquire) {
                return false;
            }
            if self.next_rank.load(Ordering::Acquire) == my_rank {
                break;
            }
            std::hint::spin_loop();
        }
        self.next_rank.fetch_add(1, Ordering::Release);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::thread;

    #[test]
    fn workers_proceed_in_published_order() {
        const N: usize = 6;
        let gate = Arc::new(IterationGate::new(&[5, 4, 3, 2, 1, 0]));
        let order_seen: Arc<std::sync::Mutex<Vec<usize>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..N)
            .map(|tid| {
                let gate = Arc::clone(&gate);
                let order_seen = Arc::clone(&order_seen);
                thread::spawn(move || {
                    let mut seen_generation = 0usize;
                    assert!(gate.await_turn(tid, &mut seen_generation));
                    order_seen.lock().unwrap().push(tid);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(*order_seen.lock().unwrap(), vec![5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn halt_releases_every_waiter() {
        const N: usize = 4;
        let gate = Arc::new(IterationGate::new(&[0, 1, 2, 3]));
        // Consume the only published generation so every worker blocks.
        let released = Arc::new(Counter::new(0));

        let handles: Vec<_> = (0..N)
            .map(|tid| {
                let gate = Arc::clone(&gate);
                let released = Arc::clone(&released);
                thread::spawn(move || {
                    // Pretend we've already consumed generation 1.
                    let mut seen_generation = 1usize;
                    let proceeded = gate.await_turn(tid, &mut seen_generation);
                    if !proceeded {
                        released.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        // Give the threads a moment to park, then halt.
        std::thread::sleep(std::time::Duration::from_millis(20));
        gate.halt();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(released.load(Ordering::SeqCst), N);
    }
}
