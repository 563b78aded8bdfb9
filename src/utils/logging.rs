//! Logging Initialization
//!
//! `RUST_LOG` wins when set; otherwise the level follows the global flags.

use tracing_subscriber::{fmt, EnvFilter};

/// Verbosity requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Silent,
    Normal,
    Debug,
}

impl Verbosity {
    pub fn from_flags(debug: bool, silent: bool) -> Self {
        if debug {
            Verbosity::Debug
        } else if silent {
            Verbosity::Silent
        } else {
            Verbosity::Normal
        }
    }

    pub fn default_directive(&self) -> &'static str {
        match self {
            Verbosity::Silent => "error",
            Verbosity::Normal => "info",
            Verbosity::Debug => "debug",
        }
    }
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean.
pub fn init_logging(verbosity: Verbosity) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directive()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_wins_over_silent() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Silent);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn test_default_directives() {
        assert_eq!(Verbosity::Silent.default_directive(), "error");
        assert_eq!(Verbosity::Normal.default_directive(), "info");
        assert_eq!(Verbosity::Debug.default_directive(), "debug");
    }
}
