//! One per test thread: loops over iterations performing the
//! synchronise-run-synchronise-observe cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use phenolphthalein_core::{Environment, Manifest, Outcome, State, TestModule};
use phenolphthalein_sync::{Permuter, Synchroniser, WaitResult};

use crate::aggregator::{Aggregator, Decision};
use crate::gate::IterationGate;
use crate::policy::CheckPolicy;

/// Why a worker's epoch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The iteration cap for the whole run was reached.
    IterationCap,
    /// This epoch's share of iterations (`--period`) was exhausted; the
    /// runner will rotate to a fresh environment and worker set.
    EpochBoundary,
    /// A `--check=exit-on-*` condition fired.
    PolicyStop { triggering_state: State },
    /// The external cancellation flag was observed by the post-barrier
    /// leader, which halted the gate before any worker could start the
    /// next iteration's pre-barrier wait.
    Cancelled,
    /// `check` returned inconsistent classifications for a previously
    /// seen state.
    Fatal {
        state: State,
        previous_accepted: bool,
        current_accepted: bool,
    },
    /// A peer's `test` or `check` entry point trapped; this worker only
    /// observed the resulting broken synchroniser or halted gate and
    /// never trapped itself. Carries no detail because the panicking
    /// worker's own unwind reports that.
    PeerTrapped,
}

/// Releases this worker's synchroniser and gate on unwind unless
/// [`Self::disarm`] is called first. Lets a panic inside a test module's
/// `test`/`check` entry point propagate normally while still unblocking
/// every peer that would otherwise be left waiting for a thread that is
/// never coming back.
struct ReleaseOnUnwind<'a> {
    gate: &'a IterationGate,
    sync: Option<&'a dyn Synchroniser>,
    armed: bool,
}

impl<'a> ReleaseOnUnwind<'a> {
    /// For the `test` call: a trap here can strand peers already blocked
    /// in the post-barrier `wait`, so the synchroniser itself must be
    /// poisoned, not just the gate.
    fn for_test_body(sync: &'a dyn Synchroniser, gate: &'a IterationGate) -> Self {
        ReleaseOnUnwind {
            gate,
            sync: Some(sync),
            armed: true,
        }
    }

    /// For the `check` call: by the time the leader runs it, every peer
    /// has already left the synchroniser and is parked at the gate for
    /// the next iteration, so halting the gate alone is enough.
    fn for_check(gate: &'a IterationGate) -> Self {
        ReleaseOnUnwind {
            gate,
            sync: None,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ReleaseOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Some(sync) = self.sync {
                sync.poison();
            }
            self.gate.halt();
        }
    }
}

pub struct Worker {
    tid: usize,
    manifest: Manifest,
    env: Environment,
    module: Arc<TestModule>,
    sync: Arc<dyn Synchroniser>,
    gate: Arc<IterationGate>,
    permuter: Arc<Mutex<Box<dyn Permuter>>>,
    aggregator: Arc<Mutex<Aggregator>>,
    cancellation: Arc<AtomicBool>,
    check_policy: CheckPolicy,
    /// `0` means unbounded for this epoch.
    epoch_iteration_budget: u64,
    /// `0` means unbounded for the whole run.
    total_iteration_cap: u64,
    snapshot_buf: State,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tid: usize,
        manifest: Manifest,
        env: Environment,
        module: Arc<TestModule>,
        sync: Arc<dyn Synchroniser>,
        gate: Arc<IterationGate>,
        permuter: Arc<Mutex<Box<dyn Permuter>>>,
        aggregator: Arc<Mutex<Aggregator>>,
        cancellation: Arc<AtomicBool>,
        check_policy: CheckPolicy,
        epoch_iteration_budget: u64,
        total_iteration_cap: u64,
    ) -> Worker {
        let n_atomic = manifest.n_atomic_int32();
        let n_plain = manifest.n_int32();
        Worker {
            tid,
            manifest,
            env,
            module,
            sync,
            gate,
            permuter,
            aggregator,
            cancellation,
            check_policy,
            epoch_iteration_budget,
            total_iteration_cap,
            snapshot_buf: phenolphthalein_core::State::sized(n_atomic, n_plain),
        }
    }

    /// Runs iterations until the epoch or the whole run ends.
    pub fn run(mut self) -> WorkerOutcome {
        let mut seen_generation = 0usize;
        let mut epoch_iterations: u64 = 0;

        loop {
            if !self.gate.await_turn(self.tid, &mut seen_generation) {
                // The gate only halts with a reason already recorded by
                // whichever leader called `halt`; re-derive a matching
                // outcome is unnecessary here because the runner reads
                // the authoritative reason straight off the leader's
                // return value, not this one. A non-leader worker simply
                // reports that it observed the halt.
                return WorkerOutcome::EpochBoundary;
            }

            if self.sync.wait(self.tid) == WaitResult::Broken {
                // Can only happen if a peer's `check` trapped during the
                // *previous* iteration's leader work and this worker was
                // already past `await_turn` before the gate halt took
                // effect; the gate is halted either way, so the next loop
                // iteration's `await_turn` would return `false` regardless.
                return WorkerOutcome::PeerTrapped;
            }

            // Cancellation is decided by the post-barrier leader alone
            // (see `observe_and_advance`), never checked here: every
            // worker that reaches this point has already committed to
            // running this iteration's test body and meeting its peers
            // at the post-barrier, so a per-worker check here could let
            // one worker bail while another has already entered `wait`
            // for the post-barrier, which never releases.
            tracing::trace!(tid = self.tid, "entering test body");
            let guard = ReleaseOnUnwind::for_test_body(self.sync.as_ref(), self.gate.as_ref());
            self.module.test(self.tid, &self.env);
            guard.disarm();

            match self.sync.wait(self.tid) {
                WaitResult::Broken => return WorkerOutcome::PeerTrapped,
                WaitResult::Leader => {
                    epoch_iterations += 1;
                    if let Some(stop) = self.observe_and_advance(epoch_iterations) {
                        return stop;
                    }
                }
                WaitResult::Follower => {}
            }
        }
    }

    /// Runs only on the post-barrier leader. Snapshots, classifies,
    /// aggregates, reseeds, and either publishes the next release order
    /// or halts the gate and returns the reason the epoch ended.
    fn observe_and_advance(&mut self, epoch_iterations: u64) -> Option<WorkerOutcome> {
        self.env.snapshot_into(&mut self.snapshot_buf);

        let outcome = if self.check_policy.invokes_check() {
            let guard = ReleaseOnUnwind::for_check(self.gate.as_ref());
            let accepted = self.module.check(&self.env);
            guard.disarm();
            if accepted {
                Outcome::Accepted
            } else {
                Outcome::Rejected
            }
        } else {
            Outcome::Unknown
        };

        let decision = {
            let mut agg = self.aggregator.lock().unwrap();
            agg.observe(self.snapshot_buf.clone(), outcome, self.check_policy)
        };

        self.env.reseed(&self.manifest);

        match decision {
            Decision::Fatal {
                state,
                previous_accepted,
                current_accepted,
            } => {
                self.gate.halt();
                tracing::error!(?state, "check returned inconsistent classification");
                return Some(WorkerOutcome::Fatal {
                    state,
                    previous_accepted,
                    current_accepted,
                });
            }
            Decision::PolicyStop { triggering_state } => {
                self.gate.halt();
                tracing::info!(?triggering_state, "check policy stop");
                return Some(WorkerOutcome::PolicyStop { triggering_state });
            }
            Decision::Continue => {}
        }

        // The sole point at which cancellation takes effect: only the
        // leader reads the flag, and only the leader ever calls `halt`,
        // so there is exactly one decision-maker per iteration. Every
        // worker (the leader included) observes the halt uniformly at
        // its next `gate.await_turn` call, before any of them calls
        // `sync.wait` for a pre-barrier the others might not reach.
        if self.cancellation.load(Ordering::Relaxed) {
            self.gate.halt();
            tracing::info!("cancellation observed, draining");
            return Some(WorkerOutcome::Cancelled);
        }

        let total_so_far = self.aggregator.lock().unwrap().total();
        tracing::trace!(leader = self.tid, total = total_so_far, "iteration observed");
        if self.total_iteration_cap > 0 && total_so_far >= self.total_iteration_cap {
            self.gate.halt();
            return Some(WorkerOutcome::IterationCap);
        }
        if self.epoch_iteration_budget > 0 && epoch_iterations >= self.epoch_iteration_budget {
            self.gate.halt();
            return Some(WorkerOutcome::EpochBoundary);
        }

        let next_order = self.permuter.lock().unwrap().permute(self.manifest.n_threads);
        self.gate.publish(&next_order);
        None
    }
}
