//! Typed, validated form of the CLI surface: iteration cap, rotation
//! period, synchroniser/permuter/check-policy choice, and output format.
//! Loadable from an optional TOML file, with CLI flags overriding
//! whatever the file supplies — the file is the defaults layer, flags
//! win.

use std::path::Path;
use std::str::FromStr;

use phenolphthalein_engine::{CheckPolicy, PermuteKind, SyncKind};
use serde::{Deserialize, Deserializer};

/// Output format of the final report. Output formatting itself is a thin
/// external adapter; this enum only names the two shapes the CLI can
/// render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    #[default]
    Histogram,
    Json,
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "histogram" => Ok(OutputKind::Histogram),
            "json" => Ok(OutputKind::Json),
            other => Err(format!(
                "unrecognised value {other:?}, expected one of [\"histogram\", \"json\"]"
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    #[serde(default = "defaults::iterations")]
    pub iterations: u64,
    #[serde(default = "defaults::period")]
    pub period: u64,
    #[serde(default = "defaults::sync", deserialize_with = "from_str_field")]
    pub sync: SyncKind,
    #[serde(default = "defaults::permute", deserialize_with = "from_str_field")]
    pub permute: PermuteKind,
    #[serde(default = "defaults::check", deserialize_with = "from_str_field")]
    pub check: CheckPolicy,
    #[serde(default)]
    pub output: OutputKind,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid --{flag}={value}: {reason}")]
    Invalid {
        flag: &'static str,
        value: String,
        reason: String,
    },
}

mod defaults {
    use phenolphthalein_engine::{CheckPolicy, PermuteKind, SyncKind};

    pub fn iterations() -> u64 {
        0
    }

    pub fn period() -> u64 {
        0
    }

    pub fn sync() -> SyncKind {
        SyncKind::Spinner
    }

    pub fn permute() -> PermuteKind {
        PermuteKind::Random
    }

    pub fn check() -> CheckPolicy {
        CheckPolicy::Report
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            iterations: defaults::iterations(),
            period: defaults::period(),
            sync: defaults::sync(),
            permute: defaults::permute(),
            check: defaults::check(),
            output: OutputKind::default(),
        }
    }
}

impl RunConfig {
    /// Loads a `RunConfig` from a TOML file, falling back to each
    /// field's default when the file omits it.
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: RunConfig = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Applies a single `--flag=value` override, as parsed by the CLI
    /// binary. Unknown flags are ignored here — the binary is the one
    /// place that validates the flag name itself; this only validates
    /// the *value* for a flag it recognises.
    pub fn apply_override(&mut self, flag: &str, value: &str) -> Result<(), ConfigError> {
        match flag {
            "iterations" => {
                self.iterations = value.parse().map_err(|e| invalid(flag, value, e))?;
            }
            "period" => {
                self.period = value.parse().map_err(|e| invalid(flag, value, e))?;
            }
            "sync" => {
                self.sync = value.parse().map_err(|e| invalid(flag, value, e))?;
            }
            "permute" => {
                self.permute = value.parse().map_err(|e| invalid(flag, value, e))?;
            }
            "check" => {
                self.check = value.parse().map_err(|e| invalid(flag, value, e))?;
            }
            "output-type" => {
                self.output = value.parse().map_err(|e| invalid(flag, value, e))?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn invalid(flag: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        flag,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn from_str_field<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.iterations, 0);
        assert_eq!(config.period, 0);
        assert_eq!(config.sync, SyncKind::Spinner);
        assert_eq!(config.permute, PermuteKind::Random);
        assert_eq!(config.check, CheckPolicy::Report);
        assert_eq!(config.output, OutputKind::Histogram);
    }

    #[test]
    fn toml_partial_override_keeps_remaining_defaults() {
        let config: RunConfig = toml::from_str("iterations = 1000\nsync = \"barrier\"\n").unwrap();
        assert_eq!(config.iterations, 1000);
        assert_eq!(config.sync, SyncKind::Barrier);
        assert_eq!(config.permute, PermuteKind::Random);
    }

    #[test]
    fn toml_rejects_unrecognised_enum_value() {
        let result: Result<RunConfig, _> = toml::from_str("sync = \"bogus\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn cli_override_wins_over_loaded_value() {
        let mut config = RunConfig {
            iterations: 100,
            ..RunConfig::default()
        };
        config.apply_override("iterations", "500").unwrap();
        assert_eq!(config.iterations, 500);
    }

    #[test]
    fn cli_override_rejects_bad_value() {
        let mut config = RunConfig::default();
        let err = config.apply_override("check", "exit-on-something").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { flag: "check", .. }));
    }
}
