//! The compile-time description of a litmus test: thread count, per-cell
//! counts, initial values, and human-readable names.
//!
//! `Manifest` is the owned, validated, Rust-native form. `RawManifest`
//! (see [`crate::abi`]) is the bit-exact ABI struct an already-resolved
//! test module exposes; [`Manifest::from_raw`] converts between the two.

use crate::state::State;

/// Which kind of storage a cell lives in.
///
/// Adding a third cell kind means adding one more variant here, one more
/// `(count, initials, names)` triple on [`Manifest`], and one more arm in
/// [`crate::environment::Environment`]'s cell arrays — nothing in the
/// Worker, Runner, or Aggregator needs to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    AtomicInt32,
    Int32,
}

/// Immutable description of a test. Read-only for the lifetime of the
/// engine once construction succeeds.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub n_threads: usize,
    pub atomic_int32_initials: Vec<i32>,
    pub atomic_int32_names: Vec<String>,
    pub int32_initials: Vec<i32>,
    pub int32_names: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest declares n_threads == 0")]
    ZeroThreads,

    #[error(
        "cell kind {kind:?} has {initials} initial value(s) but {names} name(s); they must match"
    )]
    NameCountMismatch {
        kind: CellKind,
        initials: usize,
        names: usize,
    },
}

impl Manifest {
    /// Builds an owned `Manifest` from the bit-exact `RawManifest` an
    /// already-resolved test module exposes.
    ///
    /// # Safety
    /// `raw`'s pointer fields must satisfy the preconditions of
    /// [`crate::abi::read_i32_array`] and [`crate::abi::read_c_string_array`]
    /// for the respective counts `raw` declares.
    pub unsafe fn from_raw(raw: &crate::abi::RawManifest) -> Manifest {
        unsafe {
            Manifest {
                n_threads: raw.n_threads,
                atomic_int32_initials: crate::abi::read_i32_array(
                    raw.atomic_int32_initials,
                    raw.n_atomic_int32,
                ),
                atomic_int32_names: crate::abi::read_c_string_array(
                    raw.atomic_int32_names,
                    raw.n_atomic_int32,
                ),
                int32_initials: crate::abi::read_i32_array(raw.int32_initials, raw.n_int32),
                int32_names: crate::abi::read_c_string_array(raw.int32_names, raw.n_int32),
            }
        }
    }

    pub fn n_atomic_int32(&self) -> usize {
        self.atomic_int32_initials.len()
    }

    pub fn n_int32(&self) -> usize {
        self.int32_initials.len()
    }

    /// Human-readable name for the given cell, if the manifest named it.
    pub fn name(&self, kind: CellKind, index: usize) -> Option<&str> {
        match kind {
            CellKind::AtomicInt32 => self.atomic_int32_names.get(index).map(String::as_str),
            CellKind::Int32 => self.int32_names.get(index).map(String::as_str),
        }
    }

    /// Pairs every value in `state` with its manifest name, atomic cells
    /// first, in declaration order — `x=1, y=0, 0:r0=1` rather than
    /// `state`'s bare `atomic_int32`/`int32` value vectors. A cell with
    /// no matching name (only reachable if `state` was built against a
    /// different manifest) falls back to `"?"` rather than panicking.
    pub fn named_values<'a>(&'a self, state: &'a State) -> impl Iterator<Item = (&'a str, i32)> {
        let atomic = state
            .atomic_int32
            .iter()
            .enumerate()
            .map(move |(i, &v)| (self.name(CellKind::AtomicInt32, i).unwrap_or("?"), v));
        let plain = state
            .int32
            .iter()
            .enumerate()
            .map(move |(i, &v)| (self.name(CellKind::Int32, i).unwrap_or("?"), v));
        atomic.chain(plain)
    }

    /// Checks the structural invariants the engine relies on before it
    /// spawns any worker: at least one thread, and initials/names paired
    /// up per cell kind. A configuration error here is fatal and reported
    /// before any thread starts.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.n_threads == 0 {
            return Err(ManifestError::ZeroThreads);
        }
        if self.atomic_int32_names.len() != self.atomic_int32_initials.len() {
            return Err(ManifestError::NameCountMismatch {
                kind: CellKind::AtomicInt32,
                initials: self.atomic_int32_initials.len(),
                names: self.atomic_int32_names.len(),
            });
        }
        if self.int32_names.len() != self.int32_initials.len() {
            return Err(ManifestError::NameCountMismatch {
                kind: CellKind::Int32,
                initials: self.int32_initials.len(),
                names: self.int32_names.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_manifest() -> Manifest {
        Manifest {
            n_threads: 2,
            atomic_int32_initials: vec![0, 0],
            atomic_int32_names: vec!["x".into(), "y".into()],
            int32_initials: vec![0, 0],
            int32_names: vec!["0:r0".into(), "1:r0".into()],
        }
    }

    #[test]
    fn accepts_well_formed_manifest() {
        assert!(ok_manifest().validate().is_ok());
    }

    #[test]
    fn rejects_zero_threads() {
        let mut m = ok_manifest();
        m.n_threads = 0;
        assert!(matches!(m.validate(), Err(ManifestError::ZeroThreads)));
    }

    #[test]
    fn rejects_mismatched_names() {
        let mut m = ok_manifest();
        m.atomic_int32_names.pop();
        assert!(matches!(
            m.validate(),
            Err(ManifestError::NameCountMismatch {
                kind: CellKind::AtomicInt32,
                ..
            })
        ));
    }

    #[test]
    fn named_values_pairs_atomic_then_plain_cells_in_order() {
        let m = ok_manifest();
        let state = State {
            atomic_int32: vec![1, 0],
            int32: vec![7, 9],
        };
        let pairs: Vec<(&str, i32)> = m.named_values(&state).collect();
        assert_eq!(
            pairs,
            vec![("x", 1), ("y", 0), ("0:r0", 7), ("1:r0", 9)]
        );
    }

    #[test]
    fn named_values_falls_back_to_placeholder_for_an_unnamed_cell() {
        let mut m = ok_manifest();
        m.atomic_int32_names.pop();
        let state = State {
            atomic_int32: vec![1, 0],
            int32: vec![],
        };
        let pairs: Vec<(&str, i32)> = m.named_values(&state).collect();
        assert_eq!(pairs[1], ("?", 0));
    }
}
