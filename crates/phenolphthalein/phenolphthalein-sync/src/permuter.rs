//! Decides the order in which threads are released into a given
//! iteration at the pre-barrier. On a perfect barrier this order
//! wouldn't matter, but real barriers have staggered wake-up, so it
//! affects which weak behaviours actually surface.
//!
//! This is consulted by the runner before it releases the pre-barrier,
//! not before spawning worker threads — it reorders *release*, not
//! thread creation.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Produces, for each iteration, a permutation of `[0, n_threads)`.
pub trait Permuter: Send {
    fn permute(&mut self, n_threads: usize) -> Vec<usize>;
}

/// Identity permutation, every iteration.
#[derive(Debug, Default)]
pub struct StaticPermuter;

impl Permuter for StaticPermuter {
    fn permute(&mut self, n_threads: usize) -> Vec<usize> {
        (0..n_threads).collect()
    }
}

/// Uniform shuffle, re-drawn every iteration from an engine-owned PRNG.
///
/// The PRNG is seeded once, from OS entropy, when the permuter is
/// constructed — not reseeded per thread-rotation epoch, so that
/// `--period` and permutation randomness stay independent knobs: repeated
/// short epochs must not degenerate toward the identity permutation.
pub struct RandomPermuter {
    rng: StdRng,
}

impl RandomPermuter {
    pub fn new() -> RandomPermuter {
        RandomPermuter {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for RandomPermuter {
    fn default() -> Self {
        Self::new()
    }
}

impl Permuter for RandomPermuter {
    fn permute(&mut self, n_threads: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n_threads).collect();
        order.shuffle(&mut self.rng);
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_permuter_is_identity() {
        let mut p = StaticPermuter;
        assert_eq!(p.permute(5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn permuters_agree_on_a_single_thread() {
        // When n_threads == 1, static and random permuters must produce
        // identical (trivial) orderings.
        let mut s = StaticPermuter;
        let mut r = RandomPermuter::new();
        assert_eq!(s.permute(1), vec![0]);
        assert_eq!(r.permute(1), vec![0]);
    }

    #[test]
    fn random_permuter_produces_a_valid_permutation() {
        let mut r = RandomPermuter::new();
        let mut order = r.permute(6);
        order.sort();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    }
}
