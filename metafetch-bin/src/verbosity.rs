//! `-v` and `-q` flags controlling the log level.
//!
//! Warnings are shown by default.
//! - `-q` only shows errors
//! - `-qq` silences logging
//! - `-v` shows info
//! - `-vv` shows debug
//! - `-vvv` shows trace

use std::fmt;

use log::LevelFilter;
use serde::Deserialize;

#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Verbosity {
    /// Pass many times for more log output
    ///
    /// By default, only warnings and errors are reported. Passing `-v` one
    /// time also prints info messages, `-vv` enables debug logging, and
    /// `-vvv` trace.
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet",
    )]
    verbose: u8,

    /// Less output per occurrence
    #[arg(
        long,
        short = 'q',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "verbose",
    )]
    quiet: u8,
}

impl Verbosity {
    /// Get the log level filter.
    pub(crate) const fn log_level_filter(&self) -> LevelFilter {
        filter_for(self.verbosity())
    }

    /// Returns `true` if nothing but errors should be printed
    pub(crate) const fn is_quiet(&self) -> bool {
        self.verbosity() < level_value(LevelFilter::Warn)
    }

    #[allow(clippy::cast_possible_wrap)]
    const fn verbosity(&self) -> i8 {
        level_value(LevelFilter::Warn) - (self.quiet as i8) + (self.verbose as i8)
    }
}

// Deserialize from a level name like "warn", "warning", or "Info"
impl<'de> Deserialize<'de> for Verbosity {
    #[allow(clippy::cast_sign_loss)]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let filter = match s.to_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            level => {
                return Err(serde::de::Error::custom(format!(
                    "invalid log level `{level}`"
                )));
            }
        };

        let offset = level_value(filter) - level_value(LevelFilter::Warn);
        Ok(if offset >= 0 {
            Verbosity {
                verbose: offset as u8,
                quiet: 0,
            }
        } else {
            Verbosity {
                verbose: 0,
                quiet: offset.unsigned_abs(),
            }
        })
    }
}

const fn level_value(filter: LevelFilter) -> i8 {
    match filter {
        LevelFilter::Off => 0,
        LevelFilter::Error => 1,
        LevelFilter::Warn => 2,
        LevelFilter::Info => 3,
        LevelFilter::Debug => 4,
        LevelFilter::Trace => 5,
    }
}

const fn filter_for(verbosity: i8) -> LevelFilter {
    match verbosity {
        i8::MIN..=0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.log_level_filter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Parser)]
    struct Cli {
        #[clap(flatten)]
        verbose: Verbosity,
    }

    #[test]
    fn verify_app() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_log_level() {
        let verbosity = Verbosity::default();
        assert_eq!(verbosity.log_level_filter(), LevelFilter::Warn);
        assert!(!verbosity.is_quiet());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from(["metafetch", "-vv"]);
        assert_eq!(cli.verbose.log_level_filter(), LevelFilter::Debug);

        let cli = Cli::parse_from(["metafetch", "-q"]);
        assert_eq!(cli.verbose.log_level_filter(), LevelFilter::Error);
        assert!(cli.verbose.is_quiet());

        let cli = Cli::parse_from(["metafetch", "-qqqq"]);
        assert_eq!(cli.verbose.log_level_filter(), LevelFilter::Off);
    }

    #[test]
    fn test_deserialize() {
        let verbosity: Verbosity = serde_json::from_str("\"Info\"").unwrap();
        assert_eq!(verbosity.log_level_filter(), LevelFilter::Info);

        let verbosity: Verbosity = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(verbosity.log_level_filter(), LevelFilter::Error);

        assert!(serde_json::from_str::<Verbosity>("\"loud\"").is_err());
    }
}
