#![deny(missing_docs)]
//! Shared logging utilities for the migration workspace.
//!
//! Library crates log through the `migrate_*` macros so that every message
//! goes through the `log` facade; the binary decides where it ends up.

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! migrate_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! migrate_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! migrate_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! migrate_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! migrate_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Maps the `-v`/`-q` command-line switches onto a level filter.
///
/// Quiet wins over verbose when both are given.
pub fn level_for(verbose: bool, quiet: bool) -> log::LevelFilter {
    if quiet {
        log::LevelFilter::Warn
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

/// Initializes a terminal logger for tests.
///
/// Safe to call from every test: a second initialization is silently ignored.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::level_for;
    use log::LevelFilter;

    #[test]
    fn quiet_overrides_verbose() {
        assert_eq!(level_for(true, true), LevelFilter::Warn);
        assert_eq!(level_for(true, false), LevelFilter::Debug);
        assert_eq!(level_for(false, false), LevelFilter::Info);
    }
}
