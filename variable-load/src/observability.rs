//! Logging setup for the binary.

use std::env;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::config::{LogFormat, Logging};

/// Installs the global tracing subscriber, logging to stderr.
pub fn init_tracing(logging: &Logging) {
    let (level, env_filter) = parse_rust_log(logging.level);

    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    let format = match logging.format {
        LogFormat::Pretty => format.pretty().with_filter(level).boxed(),
        LogFormat::Simplified => format.compact().with_filter(level).boxed(),
    };

    tracing_subscriber::registry()
        .with(format)
        .with(env_filter)
        .init();
}

/// Returns the level to log at and the filter of maximum verbosity per crate.
///
/// `RUST_LOG` is parsed as a plain level first and then overrides `default`. Otherwise it is used
/// literally, for users who know which overrides they want.
pub fn parse_rust_log(default: LevelFilter) -> (LevelFilter, EnvFilter) {
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<LevelFilter>() {
            Ok(level) => level,
            Err(_) => return (LevelFilter::TRACE, EnvFilter::new(value)),
        },
        Err(_) => default,
    };

    // This is the maximum verbosity that will be logged, we filter this down to `level`.
    let env_filter = EnvFilter::new("INFO,variable_load=TRACE");

    (level, env_filter)
}

/// Maps the numeric `--debug-level` flag to a level filter.
///
/// Levels range from `1` (errors only) to `6` (everything).
pub fn debug_level(level: u8) -> Option<LevelFilter> {
    match level {
        1 | 2 => Some(LevelFilter::ERROR),
        3 => Some(LevelFilter::WARN),
        4 => Some(LevelFilter::INFO),
        5 => Some(LevelFilter::DEBUG),
        6 => Some(LevelFilter::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_debug_levels() {
        assert_eq!(debug_level(1), Some(LevelFilter::ERROR));
        assert_eq!(debug_level(4), Some(LevelFilter::INFO));
        assert_eq!(debug_level(6), Some(LevelFilter::TRACE));
        assert_eq!(debug_level(0), None);
        assert_eq!(debug_level(7), None);
    }

    #[test]
    fn rust_log_overrides_level() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RUST_LOG", "debug");
            let (level, _) = parse_rust_log(LevelFilter::WARN);
            assert_eq!(level, LevelFilter::DEBUG);

            jail.set_env("RUST_LOG", "variable_load::dispatch=trace");
            let (level, _) = parse_rust_log(LevelFilter::WARN);
            assert_eq!(level, LevelFilter::TRACE);

            Ok(())
        });
    }
}
