//! Core data model and test-module ABI for the phenolphthalein litmus
//! test engine: the Manifest, the refcounted shared Environment, the
//! observed State/Outcome/Histogram value types, and the bit-exact ABI
//! structs an already-resolved test module must expose.

pub mod abi;
pub mod environment;
pub mod manifest;
pub mod module;
pub mod state;

pub use environment::{Environment, EnvironmentError};
pub use manifest::{CellKind, Manifest, ManifestError};
pub use module::TestModule;
pub use state::{Histogram, Outcome, State, total_count};
