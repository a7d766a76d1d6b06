//! Owns the top-level engine state and the run budget: constructs the
//! Environment from the test module's manifest, spawns one Worker per
//! test thread, handles thread-rotation epochs, cancellation, and the
//! check-policy state machine, and hands back the accumulated histogram.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use phenolphthalein_core::{Environment, Histogram, Manifest, State, TestModule};
use phenolphthalein_sync::{FullBarrier, Permuter, RandomPermuter, Spinner, StaticPermuter, Synchroniser};

use crate::aggregator::Aggregator;
use crate::error::RunnerError;
use crate::gate::IterationGate;
use crate::policy::{CheckPolicy, PermuteKind, SyncKind};
use crate::worker::{Worker, WorkerOutcome};

/// How a completed run ended. Distinct from [`RunnerError`]: every
/// variant here is a *successful* termination — cancellation and a
/// policy stop are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The iteration cap was reached (or, for an unbounded run, this
    /// variant is never produced — only cancellation or a policy stop
    /// can end one).
    Completed,
    /// An external cancellation signal was observed; the histogram is
    /// partial.
    Cancelled,
    /// A `--check=exit-on-*` condition fired on `triggering_state`.
    PolicyStop { triggering_state: State },
}

/// The accumulated result of a run: the full histogram, its total count,
/// the manifest it ran against (so a renderer can print cell names
/// instead of `State`'s bare value vectors), and why the run stopped.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub histogram: Histogram,
    pub total: u64,
    pub outcome: RunOutcome,
    pub manifest: Manifest,
}

/// Drives a [`TestModule`] through many iterations across real OS
/// threads. One `Runner` corresponds to one invocation of the engine;
/// `run` blocks the calling thread until the run stops.
pub struct Runner {
    module: Arc<TestModule>,
    sync_kind: SyncKind,
    permute_kind: PermuteKind,
    check_policy: CheckPolicy,
    /// `0` means unbounded.
    iterations: u64,
    /// `0` means never rotate.
    period: u64,
    cancellation: Arc<AtomicBool>,
    permuter: Arc<Mutex<Box<dyn Permuter>>>,
    aggregator: Arc<Mutex<Aggregator>>,
}

impl Runner {
    /// Validates `module`'s manifest — a configuration error here is
    /// fatal and reported before any worker starts — and builds a
    /// `Runner` ready to [`Runner::run`].
    pub fn new(
        module: TestModule,
        sync_kind: SyncKind,
        permute_kind: PermuteKind,
        check_policy: CheckPolicy,
        iterations: u64,
        period: u64,
    ) -> Result<Runner, RunnerError> {
        module.manifest().validate()?;
        let permuter: Box<dyn Permuter> = match permute_kind {
            PermuteKind::Static => Box::new(StaticPermuter),
            PermuteKind::Random => Box::new(RandomPermuter::new()),
        };
        Ok(Runner {
            module: Arc::new(module),
            sync_kind,
            permute_kind,
            check_policy,
            iterations,
            period,
            cancellation: Arc::new(AtomicBool::new(false)),
            permuter: Arc::new(Mutex::new(permuter)),
            aggregator: Arc::new(Mutex::new(Aggregator::new())),
        })
    }

    /// A handle the per-iteration leader observes before admitting the
    /// next iteration (see `Worker::observe_and_advance`), so every
    /// worker learns of cancellation uniformly, through the same gate
    /// halt that ends any other epoch. The CLI binary (or a test's timer
    /// thread) sets this to request a graceful drain; signal handling
    /// itself stays the caller's concern.
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancellation)
    }

    /// Runs epochs until the iteration cap, a policy stop, a fatal
    /// test-contract violation, or cancellation ends the run.
    pub fn run(&self) -> Result<RunReport, RunnerError> {
        let manifest = self.module.manifest().clone();
        let n_threads = manifest.n_threads;

        loop {
            tracing::info!(
                n_threads,
                sync = ?self.sync_kind,
                permute = ?self.permute_kind,
                period = self.period,
                "starting epoch"
            );

            let env = Environment::new(&manifest);
            let sync: Arc<dyn Synchroniser> = match self.sync_kind {
                SyncKind::Spinner => Arc::new(Spinner::new(n_threads)),
                SyncKind::Barrier => Arc::new(FullBarrier::new(n_threads)),
            };
            let initial_order = self.permuter.lock().unwrap().permute(n_threads);
            let gate = Arc::new(IterationGate::new(&initial_order));
            let epoch_budget = self.period;

            let mut handles = Vec::with_capacity(n_threads);
            for tid in 0..n_threads {
                let worker = Worker::new(
                    tid,
                    manifest.clone(),
                    env.clone(),
                    Arc::clone(&self.module),
                    Arc::clone(&sync),
                    Arc::clone(&gate),
                    Arc::clone(&self.permuter),
                    Arc::clone(&self.aggregator),
                    Arc::clone(&self.cancellation),
                    self.check_policy,
                    epoch_budget,
                    self.iterations,
                );
                let handle = thread::Builder::new()
                    .name(format!("phenolphthalein-worker-{tid}"))
                    .spawn(move || worker.run())
                    .map_err(|_| RunnerError::ThreadSpawn { tid })?;
                handles.push((tid, handle));
            }

            let mut outcomes = Vec::with_capacity(n_threads);
            let mut trapped: Option<(usize, String)> = None;
            for (tid, handle) in handles {
                match handle.join() {
                    Ok(outcome) => outcomes.push(outcome),
                    // A worker's `test`/`check` entry point panicked and
                    // was allowed to unwind (see `Worker::run`'s
                    // `ReleaseOnUnwind` guard, which already poisoned the
                    // synchroniser and halted the gate so every other
                    // worker's `handle.join()` above returned promptly
                    // instead of hanging on a stranded peer). Keep
                    // joining the rest so no thread is left detached, but
                    // report only the first trap.
                    Err(payload) => {
                        trapped.get_or_insert_with(|| (tid, panic_message(payload.as_ref())));
                    }
                }
            }

            if let Some((tid, message)) = trapped {
                let agg = self.aggregator.lock().unwrap();
                return Err(RunnerError::WorkerPanicked {
                    tid,
                    message,
                    partial_total: agg.total(),
                    partial_histogram: agg.histogram().clone(),
                });
            }

            match authoritative_outcome(&outcomes) {
                WorkerOutcome::Fatal {
                    state,
                    previous_accepted,
                    current_accepted,
                } => {
                    return Err(RunnerError::InconsistentCheck {
                        state,
                        previous: previous_accepted,
                        current: current_accepted,
                    });
                }
                WorkerOutcome::Cancelled => {
                    tracing::info!(total = self.total(), "cancelled, draining partial histogram");
                    return Ok(self.report(RunOutcome::Cancelled));
                }
                WorkerOutcome::PolicyStop { triggering_state } => {
                    tracing::info!(?triggering_state, "check policy stopped the run");
                    return Ok(self.report(RunOutcome::PolicyStop { triggering_state }));
                }
                WorkerOutcome::IterationCap => {
                    tracing::info!(total = self.total(), "iteration cap reached");
                    return Ok(self.report(RunOutcome::Completed));
                }
                WorkerOutcome::EpochBoundary => {
                    tracing::info!(total = self.total(), "epoch boundary, rotating environment");
                    continue;
                }
                WorkerOutcome::PeerTrapped => {
                    // `authoritative_outcome` never selects this variant
                    // (see its doc comment); the worker that actually
                    // panicked is caught by `handle.join()`'s `Err` arm
                    // above, which always returns before this match runs.
                    unreachable!("authoritative_outcome never returns PeerTrapped")
                }
            }
        }
    }

    fn total(&self) -> u64 {
        self.aggregator.lock().unwrap().total()
    }

    fn report(&self, outcome: RunOutcome) -> RunReport {
        let agg = self.aggregator.lock().unwrap();
        RunReport {
            histogram: agg.histogram().clone(),
            total: agg.total(),
            outcome,
            manifest: self.module.manifest().clone(),
        }
    }
}

/// Picks the one meaningful reason out of an epoch's `n_threads`
/// [`WorkerOutcome`]s. Only the post-barrier leader that actually halted
/// the gate returns a specific reason (`Fatal`/`PolicyStop`/`IterationCap`,
/// or, for cancellation, whichever workers observed the flag first);
/// every other worker just reports that it saw the gate halted
/// ([`WorkerOutcome::EpochBoundary`]) or the synchroniser broken
/// ([`WorkerOutcome::PeerTrapped`]), so neither variant is ever the
/// preferred match — a worker that actually trapped never reaches this
/// function at all, since `Runner::run` reads that off `handle.join()`'s
/// `Err` arm before `outcomes` is even inspected.
fn authoritative_outcome(outcomes: &[WorkerOutcome]) -> WorkerOutcome {
    outcomes
        .iter()
        .find(|o| matches!(o, WorkerOutcome::Fatal { .. }))
        .or_else(|| outcomes.iter().find(|o| matches!(o, WorkerOutcome::PolicyStop { .. })))
        .or_else(|| outcomes.iter().find(|o| matches!(o, WorkerOutcome::Cancelled)))
        .or_else(|| outcomes.iter().find(|o| matches!(o, WorkerOutcome::IterationCap)))
        .cloned()
        .unwrap_or(WorkerOutcome::EpochBoundary)
}

/// Extracts a human-readable message out of a `thread::Result`'s `Err`
/// payload. `panic!("{x}")`/`panic!("literal")` cover the two payload
/// shapes the standard library's panic hook actually produces; anything
/// else (a custom payload from `panic_any`) falls back to a fixed string
/// rather than failing to report the crash at all.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
