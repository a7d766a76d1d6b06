//! The shared mutable state of a single iteration: typed atomic and
//! non-atomic cell arrays, refcounted so a worker and the runner can both
//! hold it across an iteration window.
//!
//! # Refcount discipline
//!
//! The backing arrays live behind an `Arc<EnvironmentInner>`. The
//! refcount itself is therefore Rust's own atomic refcount, held in
//! `Arc`'s private control block — never a field of [`crate::abi::RawEnv`],
//! the struct test code actually sees. Prior ABI variants packed the
//! refcount directly into the public env struct, which risks a test
//! reading or corrupting it as if it were ordinary test state.
//!
//! # Why raw pointers at all
//!
//! Test bodies need full control over memory ordering on the atomic
//! cells, and the non-atomic cells are *meant* to be racy — that race is
//! the entire point of a relaxed-memory litmus test. So `as_raw_env`
//! hands out raw pointers into the backing arrays rather than safe
//! references; the engine deliberately steps outside the borrow checker
//! here; everywhere outside a running iteration it enforces the "exactly
//! one mutator" invariant itself (see module docs on [`Environment::reseed`]).

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::abi::RawEnv;
use crate::manifest::Manifest;
use crate::state::State;

struct EnvironmentInner {
    atomic_int32: Box<[AtomicI32]>,
    int32: Box<[UnsafeCell<i32>]>,
}

// SAFETY: `int32`'s `UnsafeCell<i32>` cells are shared the same way the
// `atomic_int32` cells are: test bodies receive raw pointers into this
// array and are responsible for whatever ordering discipline their own
// litmus test calls for. No code outside a running iteration touches
// `int32` except the single serialised reseeder (see `Environment::reseed`),
// and the engine never constructs a safe `&i32`/`&mut i32` into this
// array while an iteration is in flight.
unsafe impl Sync for EnvironmentInner {}

/// The shared environment of one iteration (or, across an epoch, many
/// iterations reseeded in place).
///
/// Cheaply `Clone`-able: cloning bumps the `Arc` refcount rather than
/// copying the backing arrays. When the last clone is dropped, the
/// arrays are freed.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("failed to allocate environment arrays for manifest")]
    Allocation,
}

impl Environment {
    /// Allocates and seeds a fresh environment from `manifest`'s initial
    /// values. Called at engine start and again at the start of every
    /// thread-rotation epoch.
    pub fn new(manifest: &Manifest) -> Environment {
        let atomic_int32 = manifest
            .atomic_int32_initials
            .iter()
            .map(|&v| AtomicI32::new(v))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let int32 = manifest
            .int32_initials
            .iter()
            .map(|&v| UnsafeCell::new(v))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Environment {
            inner: Arc::new(EnvironmentInner {
                atomic_int32,
                int32,
            }),
        }
    }

    pub fn n_atomic_int32(&self) -> usize {
        self.inner.atomic_int32.len()
    }

    pub fn n_int32(&self) -> usize {
        self.inner.int32.len()
    }

    /// Bounds-checked atomic read, for use *outside* a running iteration
    /// (e.g. instrumentation, tests). Out-of-range reads return zero
    /// rather than panicking: a malformed test must never turn into
    /// undefined behaviour by way of a bad cell index.
    ///
    /// Implementers: the correct guard rejects out-of-range indices
    /// (`index >= n`), not the inverted `index < n` seen in some prior
    /// implementations of this accessor.
    pub fn get_atomic(&self, index: usize) -> i32 {
        match self.inner.atomic_int32.get(index) {
            Some(cell) => cell.load(Ordering::SeqCst),
            None => 0,
        }
    }

    /// Bounds-checked atomic write, for use *outside* a running
    /// iteration. Out-of-range writes are silently ignored.
    pub fn set_atomic(&self, index: usize, value: i32) {
        if let Some(cell) = self.inner.atomic_int32.get(index) {
            cell.store(value, Ordering::SeqCst);
        }
    }

    /// Bounds-checked non-atomic read, for use *outside* a running
    /// iteration.
    pub fn get_nonatomic(&self, index: usize) -> i32 {
        match self.inner.int32.get(index) {
            // SAFETY: no iteration is in flight when this is called (the
            // reseeder is the sole mutator between iterations), so no
            // other reference to this cell can exist concurrently.
            Some(cell) => unsafe { *cell.get() },
            None => 0,
        }
    }

    /// Bounds-checked non-atomic write, for use *outside* a running
    /// iteration. Out-of-range writes are silently ignored.
    pub fn set_nonatomic(&self, index: usize, value: i32) {
        if let Some(cell) = self.inner.int32.get(index) {
            // SAFETY: see `get_nonatomic`.
            unsafe { *cell.get() = value };
        }
    }

    /// Restores every cell to `manifest`'s initial value. Called only by
    /// the post-barrier leader, strictly after the post-barrier and
    /// strictly before the next iteration's pre-barrier releases — the
    /// reseeder is always the sole mutator of `self` during this window.
    ///
    /// Always reseeds from the manifest, never from a cached prior
    /// snapshot, so that thread-rotation (a fresh `Environment`) and an
    /// in-place reseed (the same `Environment`, next iteration) are
    /// observably identical to test code.
    pub fn reseed(&self, manifest: &Manifest) {
        for (cell, &initial) in self
            .inner
            .atomic_int32
            .iter()
            .zip(manifest.atomic_int32_initials.iter())
        {
            cell.store(initial, Ordering::SeqCst);
        }
        for (cell, &initial) in self.inner.int32.iter().zip(manifest.int32_initials.iter()) {
            // SAFETY: see `get_nonatomic`.
            unsafe { *cell.get() = initial };
        }
    }

    /// Snapshots every cell's current value into a freshly allocated
    /// [`State`]. Only ever called by the post-barrier leader, after the
    /// post-barrier has established a happens-before edge over every
    /// test-body access of the iteration that just finished.
    pub fn snapshot(&self) -> State {
        let mut state = State::sized(self.n_atomic_int32(), self.n_int32());
        self.snapshot_into(&mut state);
        state
    }

    /// Snapshots in place into a preallocated [`State`], avoiding the
    /// allocation `snapshot` performs. Workers preallocate their `State`
    /// buffer once at construction and call this every iteration so the
    /// hot loop never touches the allocator.
    pub fn snapshot_into(&self, out: &mut State) {
        debug_assert_eq!(out.atomic_int32.len(), self.n_atomic_int32());
        debug_assert_eq!(out.int32.len(), self.n_int32());
        for (slot, cell) in out.atomic_int32.iter_mut().zip(self.inner.atomic_int32.iter()) {
            *slot = cell.load(Ordering::SeqCst);
        }
        for (slot, cell) in out.int32.iter_mut().zip(self.inner.int32.iter()) {
            // SAFETY: see `get_nonatomic`.
            *slot = unsafe { *cell.get() };
        }
    }

    /// Builds the ABI-compatible [`RawEnv`] handed to a test module's
    /// `test`/`check` entry points. The returned pointers stay valid for
    /// as long as `self` (or any clone of it) is alive; callers must keep
    /// an `Environment` clone alive across the whole window in which the
    /// raw env is used.
    pub fn as_raw_env(&self) -> RawEnv {
        RawEnv {
            n_atomic_int32: self.inner.atomic_int32.len(),
            atomic_int32: self.inner.atomic_int32.as_ptr() as *mut AtomicI32,
            n_int32: self.inner.int32.len(),
            // SAFETY: `UnsafeCell<i32>` is `#[repr(transparent)]` over
            // `i32`, so a pointer to the first element of `[UnsafeCell<i32>]`
            // is a valid pointer to the first element of an `[i32]` with
            // the same length.
            int32: self.inner.int32.as_ptr() as *mut i32,
            priv_: std::ptr::null_mut(),
        }
    }
}
