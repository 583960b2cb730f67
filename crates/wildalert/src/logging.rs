//! Logging configuration for wildalert.
//!
//! Feed state transitions, probe results and alert sends are all reported
//! through `tracing`; this module installs the subscriber.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directives covering this crate and the platform crate.
    ///
    /// Dependencies such as reqwest and hyper never log below `warn`.
    #[must_use]
    pub fn directives(&self) -> String {
        let level = self.to_level_filter();
        let others = level.min(Level::WARN);
        format!("{others},wildalert={level},wildalert_linux={level}")
    }
}

/// Initialize the logging system.
///
/// The level comes from `verbosity` unless `RUST_LOG` is set, which takes
/// precedence. Calling this more than once is harmless.
///
/// # Examples
///
/// ```no_run
/// use wildalert::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directives()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr),
    );

    // Ignore the error if a subscriber is already installed
    let _ = subscriber.try_init();
}

/// Route this crate's logs to the test harness at debug level.
///
/// `RUST_LOG` still wins, so `RUST_LOG=wildalert=trace cargo test` shows the
/// probe and timer detail of a failing runner test.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Verbosity::Verbose.directives()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
