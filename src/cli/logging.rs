//! Logging utilities for CLI output

/// Log level for CLI output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Suppress all output except errors
    Quiet,
    /// Normal output level
    Normal,
    /// Verbose output with additional details
    Verbose,
}

impl LogLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            LogLevel::Quiet
        } else if verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Normal
        }
    }

    /// Default filter for the `log` facade; `RUST_LOG` takes precedence
    pub fn filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Quiet => log::LevelFilter::Error,
            LogLevel::Normal => log::LevelFilter::Info,
            LogLevel::Verbose => log::LevelFilter::Debug,
        }
    }
}

/// Install env_logger at `level`; later calls are no-ops
pub fn init_logger(level: LogLevel) {
    let _ = env_logger::Builder::new()
        .filter_level(level.filter())
        .parse_default_env()
        .format_timestamp_secs()
        .try_init();
}

/// Print a message if the current level permits it
pub fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}
