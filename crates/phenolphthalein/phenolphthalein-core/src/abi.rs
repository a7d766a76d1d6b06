//! Bit-exact ABI structs: the compatibility boundary with externally
//! compiled test modules.
//!
//! These mirror the external test-module interface field-for-field
//! (order, width, pointer kind). Dynamic-library loading itself
//! (resolving a `manifest`/`test`/`check`
//! symbol triple from a `.so`/`.dylib`) is out of scope for the engine —
//! it is handed an already-resolved test module — but the shapes those
//! symbols must have are very much in scope, since both a future loader
//! and this crate's statically-linked demo tests must agree on them.
//!
//! # Layout
//!
//! ```text
//! RawManifest
//! ┌───────────────────────────────────────────────────────────┐
//! │ n_threads              : usize                             │
//! │ n_atomic_int32         : usize                              │
//! │ atomic_int32_initials  : *const i32                         │
//! │ atomic_int32_names     : *const *const c_char                │
//! │ n_int32                : usize                              │
//! │ int32_initials         : *const i32                         │
//! │ int32_names            : *const *const c_char                │
//! └───────────────────────────────────────────────────────────┘
//!
//! RawEnv (passed to `test`/`check`)
//! ┌───────────────────────────────────────────────────────────┐
//! │ n_atomic_int32 : usize                                      │
//! │ atomic_int32   : *mut AtomicI32                             │
//! │ n_int32        : usize                                      │
//! │ int32          : *mut i32                                   │
//! │ priv_          : *mut c_void   (ABI field name: `priv`)      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The refcount that keeps the backing arrays alive is deliberately
//! **not** a field of `RawEnv`. Prior variants of this ABI packed the
//! refcount directly into the struct the test sees, which exposes the
//! refcount word to test code as if it were ordinary test state; this
//! engine keeps it in the private `Arc` control block behind `priv_`
//! instead (see [`crate::environment::Environment`]).

use std::ffi::{c_char, c_void};
use std::sync::atomic::AtomicI32;

/// Bit-exact mirror of the test module's `manifest` symbol.
#[repr(C)]
pub struct RawManifest {
    pub n_threads: usize,
    pub n_atomic_int32: usize,
    pub atomic_int32_initials: *const i32,
    pub atomic_int32_names: *const *const c_char,
    pub n_int32: usize,
    pub int32_initials: *const i32,
    pub int32_names: *const *const c_char,
}

/// Bit-exact mirror of the environment struct passed to `test`/`check`.
///
/// `priv_` is reserved: test code must not read or write it. It is opaque
/// to the ABI on purpose — the engine is free to change what it points
/// to (today: nothing; the data lives behind the handle the engine keeps
/// for itself) without breaking already-compiled test modules.
#[repr(C)]
pub struct RawEnv {
    pub n_atomic_int32: usize,
    pub atomic_int32: *mut AtomicI32,
    pub n_int32: usize,
    pub int32: *mut i32,
    pub priv_: *mut c_void,
}

/// Calling convention of a test module's `test` symbol.
///
/// `"C-unwind"` rather than plain `"C"`: a trap inside test code must be
/// able to unwind back into the engine (see
/// `phenolphthalein_engine::Worker::run`) instead of aborting the whole
/// process the instant it tries to leave this function.
pub type TestFn = unsafe extern "C-unwind" fn(tid: usize, env: *mut RawEnv);

/// Calling convention of a test module's `check` symbol. Same `"C-unwind"`
/// rationale as [`TestFn`].
pub type CheckFn = unsafe extern "C-unwind" fn(env: *const RawEnv) -> bool;

/// Reads a manifest's `atomic_int32_names`/`int32_names` C-string arrays
/// into owned `String`s.
///
/// # Safety
/// `names` must be a valid pointer to `count` non-null, NUL-terminated,
/// UTF-8 C strings, or null when `count == 0`.
pub unsafe fn read_c_string_array(names: *const *const c_char, count: usize) -> Vec<String> {
    if count == 0 || names.is_null() {
        return Vec::new();
    }
    (0..count)
        .map(|i| unsafe {
            let ptr = *names.add(i);
            std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
        })
        .collect()
}

/// Reads a manifest's `*_initials` array into an owned `Vec<i32>`.
///
/// # Safety
/// `initials` must be a valid pointer to `count` contiguous `i32`s, or
/// null when `count == 0`.
pub unsafe fn read_i32_array(initials: *const i32, count: usize) -> Vec<i32> {
    if count == 0 || initials.is_null() {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(initials, count) }.to_vec()
}
