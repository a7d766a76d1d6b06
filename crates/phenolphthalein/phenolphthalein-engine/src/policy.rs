//! The small enums that parameterise a [`crate::Runner`]: which
//! synchroniser and permuter to wire up, and what the check-policy state
//! machine does with each observation.

/// Which [`phenolphthalein_sync::Synchroniser`] implementation a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncKind {
    #[default]
    Spinner,
    Barrier,
}

/// Which [`phenolphthalein_sync::Permuter`] implementation a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermuteKind {
    Static,
    #[default]
    Random,
}

/// Governs whether `check` is invoked at all, and whether a particular
/// classification should end the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckPolicy {
    /// `check` is never called; every observation is recorded with
    /// [`phenolphthalein_core::Outcome::Unknown`].
    Disable,
    /// `check` is called and recorded, but no outcome ever stops the run.
    #[default]
    Report,
    ExitOnPass,
    ExitOnFail,
    ExitOnUnknown,
}

impl CheckPolicy {
    pub fn invokes_check(self) -> bool {
        !matches!(self, CheckPolicy::Disable)
    }
}

/// A config or CLI value didn't match any recognised variant name.
///
/// Surfaced as a configuration error by whichever caller parses
/// `--sync=`/`--permute=`/`--check=` — reported before any worker
/// spawns, never discovered mid-run.
#[derive(Debug)]
pub struct UnknownVariant {
    pub value: String,
    pub expected: &'static [&'static str],
}

impl std::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unrecognised value {:?}, expected one of {:?}",
            self.value, self.expected
        )
    }
}

impl std::error::Error for UnknownVariant {}

impl std::str::FromStr for SyncKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spinner" => Ok(SyncKind::Spinner),
            "barrier" => Ok(SyncKind::Barrier),
            other => Err(UnknownVariant {
                value: other.to_string(),
                expected: &["spinner", "barrier"],
            }),
        }
    }
}

impl std::str::FromStr for PermuteKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(PermuteKind::Static),
            "random" => Ok(PermuteKind::Random),
            other => Err(UnknownVariant {
                value: other.to_string(),
                expected: &["static", "random"],
            }),
        }
    }
}

impl std::str::FromStr for CheckPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(CheckPolicy::Disable),
            "report" => Ok(CheckPolicy::Report),
            "exit-on-pass" => Ok(CheckPolicy::ExitOnPass),
            "exit-on-fail" => Ok(CheckPolicy::ExitOnFail),
            "exit-on-unknown" => Ok(CheckPolicy::ExitOnUnknown),
            other => Err(UnknownVariant {
                value: other.to_string(),
                expected: &[
                    "disable",
                    "report",
                    "exit-on-pass",
                    "exit-on-fail",
                    "exit-on-unknown",
                ],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_kind_round_trips_known_values() {
        assert_eq!("spinner".parse::<SyncKind>().unwrap(), SyncKind::Spinner);
        assert_eq!("barrier".parse::<SyncKind>().unwrap(), SyncKind::Barrier);
        assert!("bogus".parse::<SyncKind>().is_err());
    }

    #[test]
    fn check_policy_round_trips_known_values() {
        assert_eq!(
            "exit-on-fail".parse::<CheckPolicy>().unwrap(),
            CheckPolicy::ExitOnFail
        );
        assert!("exit-on-something".parse::<CheckPolicy>().is_err());
    }
}
