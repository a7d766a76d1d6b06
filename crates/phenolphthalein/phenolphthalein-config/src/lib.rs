//! Typed configuration for a phenolphthalein run: the CLI surface as a
//! `serde`-deserialisable struct, loadable from TOML and overridable by
//! CLI flags.

pub mod config;

pub use config::{ConfigError, OutputKind, RunConfig};
