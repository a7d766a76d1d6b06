use phenolphthalein_core::{EnvironmentError, Histogram, ManifestError};

/// Errors the engine can report before or during a run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("failed to allocate environment: {0}")]
    Allocation(#[from] EnvironmentError),

    #[error("failed to spawn worker thread {tid}")]
    ThreadSpawn { tid: usize },

    #[error("check returned inconsistent classifications for state {state:?}: previously {previous}, now {current}")]
    InconsistentCheck {
        state: phenolphthalein_core::State,
        previous: bool,
        current: bool,
    },

    /// A worker's `test` or `check` entry point trapped. `partial_total`
    /// and `partial_histogram` carry whatever the run had accumulated
    /// before the crash — the run is not recoverable, but the data
    /// collected so far isn't thrown away either.
    #[error("worker {tid} panicked: {message} ({partial_total} iteration(s) observed before the crash)")]
    WorkerPanicked {
        tid: usize,
        message: String,
        partial_total: u64,
        partial_histogram: Histogram,
    },
}
