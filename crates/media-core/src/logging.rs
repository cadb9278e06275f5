//! Logging setup
//!
//! The library itself only emits `tracing` events. Binaries and tests that
//! want to see them call [`setup_logging`] once at startup.

use crate::error::{MediaError, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::TestWriter;
use tracing_subscriber::EnvFilter;

/// Where formatted events go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    /// Standard error
    #[default]
    Stderr,
    /// Output captured by the test harness
    TestHarness,
}

/// Subscriber settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level applied on top of `RUST_LOG`
    pub level: Level,
    /// Print file and line of each event
    pub file_info: bool,
    /// Log span enter and exit
    pub log_spans: bool,
    /// Print the thread name, useful with threaded sources
    pub thread_names: bool,
    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingConfig {
    /// Plain stderr logging at `level`
    pub fn new(level: Level) -> Self {
        Self {
            level,
            file_info: false,
            log_spans: false,
            thread_names: false,
            output: LogOutput::Stderr,
        }
    }

    /// Warnings and above, written through the test harness
    pub fn for_tests() -> Self {
        Self {
            output: LogOutput::TestHarness,
            thread_names: true,
            ..Self::new(Level::WARN)
        }
    }

    /// Take the level from its name, e.g. `"debug"` or `"WARN"`
    pub fn with_level_str(mut self, level: &str) -> Result<Self> {
        self.level = Level::from_str(level)
            .map_err(|_| MediaError::config(format!("Invalid log level: {}", level)))?;
        Ok(self)
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }

    pub fn with_thread_names(mut self) -> Self {
        self.thread_names = true;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::from_default_env().add_directive(self.level.into())
    }

    fn writer(&self) -> BoxMakeWriter {
        match self.output {
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogOutput::TestHarness => BoxMakeWriter::new(TestWriter::new()),
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// Fails if a subscriber is already installed, so repeated calls are safe.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_span_events(span_events)
        .with_thread_names(config.thread_names)
        .with_file(config.file_info)
        .with_line_number(config.file_info)
        .with_writer(config.writer())
        .try_init()
        .map_err(|e| MediaError::config(format!("logging already initialized: {}", e)))?;

    tracing::debug!(version = crate::VERSION, level = %config.level, "Logging ready");
    Ok(())
}
