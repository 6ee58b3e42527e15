//! Logging utilities for CLI output

use tracing_subscriber::EnvFilter;

/// Log level for CLI output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Suppress all output
    Quiet,
    /// Normal output level
    Normal,
    /// Verbose output with additional details
    Verbose,
}

impl LogLevel {
    /// Default filter when `RUST_LOG` is not set
    pub fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "desaprender=error",
            Self::Normal => "desaprender=info",
            Self::Verbose => "desaprender=debug",
        }
    }
}

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` takes precedence over the level chosen on the command line.
/// Installing twice is a no-op.
pub fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Print a message to stdout if the current level permits it
pub fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives() {
        assert_eq!(LogLevel::Quiet.directive(), "desaprender=error");
        assert!(LogLevel::Verbose.directive().ends_with("debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(LogLevel::Quiet);
        init_tracing(LogLevel::Verbose);
    }
}
