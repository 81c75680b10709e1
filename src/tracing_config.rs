//! Tracing configuration for the command-line binary
//!
//! The library only emits `log` records and `tracing` spans; installing a
//! subscriber is left to the application. `log` records are bridged into the
//! subscriber by `tracing-subscriber`'s `tracing-log` integration.

use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable output with colors (default for CLI)
    Console,
    /// Compact output without colors, for CI logs
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Configuration for tracing output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    /// Output to stderr (default)
    Console,
    /// Output to a file
    #[cfg(feature = "tracing-files")]
    File(std::path::PathBuf),
}

/// Keeps background log writers alive; drop it only at exit
#[derive(Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct TracingGuard {
    #[cfg(feature = "tracing-files")]
    _file: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    pub format: TracingFormat,
    pub output: TracingOutput,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlating one run's records
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-2+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Set custom environment filter
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",  // Default: progress messages and above
            1 => "debug", // -v: candidates, timings, backend setup
            _ => "trace", // -vv+: everything
        }
    }

    fn make_writer(&self) -> (BoxMakeWriter, TracingGuard) {
        match &self.output {
            TracingOutput::Console => (BoxMakeWriter::new(std::io::stderr), TracingGuard::default()),
            #[cfg(feature = "tracing-files")]
            TracingOutput::File(path) => {
                use tracing_appender::{non_blocking, rolling};

                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| std::path::Path::new("."));
                let file_name = path
                    .file_name()
                    .unwrap_or_else(|| std::ffi::OsStr::new("faceblur.log"));
                let (writer, guard) = non_blocking(rolling::never(dir, file_name));
                (BoxMakeWriter::new(writer), TracingGuard { _file: Some(guard) })
            },
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<TracingGuard> {
        let filter = match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };
        let ansi = self.format == TracingFormat::Console && self.output == TracingOutput::Console;
        let (writer, guard) = self.make_writer();
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console | TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(ansi)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(fmt_layer).try_init()?;
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "Face blur session started");
        }

        Ok(guard)
    }
}

/// Initialize tracing with CLI defaults and a fresh session id
///
/// # Errors
/// - Subscriber installation failures
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<(TracingGuard, String)> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let guard = TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(TracingFormat::Console)
        .with_session_id(session_id.clone())
        .init()?;
    Ok((guard, session_id))
}

/// Span helpers for the CLI run
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering the entire CLI invocation
    #[must_use]
    pub fn session(session_id: &str, mode: &str, provider: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "session",
            session_id = %session_id,
            mode = %mode,
            provider = %provider
        )
    }

    /// Span around fetching the detector model
    #[must_use]
    pub fn model_download(url: &str) -> Span {
        tracing::span!(Level::INFO, "model_download", url = %url)
    }

    /// Span around one input file
    #[must_use]
    pub fn file_processing(input: &std::path::Path, output: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "file_processing",
            input = %input.display(),
            output = %output.display()
        )
    }
}

/// Event helpers for common logging patterns
pub mod events {
    use tracing::{error, warn};

    /// Log an error with context
    pub fn error_with_context(error: &dyn std::fmt::Display, context: &str) {
        error!(error = %error, context = %context, "Operation failed");
    }

    /// Log a warning with a suggested fix
    pub fn warning_with_recommendation(message: &str, recommendation: &str) {
        warn!(recommendation = %recommendation, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(TracingConfig::new().with_verbosity(0).verbosity_to_filter(), "info");
        assert_eq!(TracingConfig::new().with_verbosity(1).verbosity_to_filter(), "debug");
        assert_eq!(TracingConfig::new().with_verbosity(2).verbosity_to_filter(), "trace");
        assert_eq!(TracingConfig::new().with_verbosity(9).verbosity_to_filter(), "trace");
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_format(TracingFormat::Compact)
            .with_env_filter("faceblur=trace")
            .with_session_id("test-session");

        assert_eq!(config.verbosity, 2);
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.env_filter.as_deref(), Some("faceblur=trace"));
        assert_eq!(config.session_id.as_deref(), Some("test-session"));
    }

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.format, TracingFormat::Console);
        assert_eq!(config.output, TracingOutput::Console);
        assert!(config.env_filter.is_none());
    }
}
