//! Logging setup on `tracing-subscriber`, driven by [`LoggingConfig`].
//!
//! ```rust,ignore
//! let config = courier_runtime::config::load_config()?;
//! courier_runtime::logging::init_from_config(&config.logging);
//! ```
//!
//! Every dispatch runs inside a `dispatch` span carrying the request and
//! handler. With `span_events.new` and `span_events.close` set, each dispatch
//! logs one line when it starts and one when it ends, including its duration.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

/// Installs the global subscriber described by `config`.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

fn fmt_span(config: &SpanEventConfig) -> FmtSpan {
    [
        (config.new, FmtSpan::NEW),
        (config.enter, FmtSpan::ENTER),
        (config.exit, FmtSpan::EXIT),
        (config.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}

/// Subscriber settings resolved from a [`LoggingConfig`].
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    span_events: FmtSpan,
    format: LogFormat,
    output: LogOutput,
    thread_ids: bool,
    file_location: bool,
    file: Option<(PathBuf, LogRotation)>,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::from_config(&LoggingConfig::default())
    }
}

impl LoggingBuilder {
    /// Resolves `config` into subscriber settings.
    ///
    /// Filter directives are sorted by target, so the same configuration
    /// always yields the same filter.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));

        Self {
            level: config.level.to_tracing_level(),
            directives: filters
                .into_iter()
                .map(|(target, level)| format!("{target}={level}"))
                .collect(),
            span_events: fmt_span(&config.span_events),
            format: config.format,
            output: config.output,
            thread_ids: config.thread_ids,
            file_location: config.file_location,
            file: config
                .file_path
                .clone()
                .map(|path| (path, config.rotation)),
        }
    }

    /// Adds a filter directive such as `courier_core=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// `RUST_LOG` if set, else the configured level, plus the directives.
    fn build_filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(err) => eprintln!("Ignoring invalid log directive {directive:?}: {err}"),
            }
        }

        filter
    }

    fn file_appender(path: &Path, rotation: LogRotation) -> RollingFileAppender {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path.file_name().unwrap_or_else(|| OsStr::new("courier.log"));
        match rotation {
            LogRotation::Never => tracing_appender::rolling::never(dir, name),
            LogRotation::Hourly => tracing_appender::rolling::hourly(dir, name),
            LogRotation::Daily => tracing_appender::rolling::daily(dir, name),
        }
    }

    /// Installs the subscriber.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already installed.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        let span_events = self.span_events.clone();

        macro_rules! install {
            ($layer:expr) => {
                tracing_subscriber::registry()
                    .with(
                        $layer
                            .with_span_events(span_events)
                            .with_thread_ids(self.thread_ids)
                            .with_file(self.file_location)
                            .with_line_number(self.file_location),
                    )
                    .with(filter)
                    .try_init()
            };
        }

        macro_rules! install_with_writer {
            ($writer:expr) => {
                match self.format {
                    #[cfg(feature = "json-log")]
                    LogFormat::Json => install!(fmt::layer().json().with_writer($writer)),
                    LogFormat::Compact => install!(fmt::layer().compact().with_writer($writer)),
                    LogFormat::Full => install!(fmt::layer().with_writer($writer)),
                    LogFormat::Pretty => install!(fmt::layer().pretty().with_writer($writer)),
                }
            };
        }

        match (self.output, &self.file) {
            (LogOutput::Stdout, _) => install_with_writer!(std::io::stdout),
            (LogOutput::Stderr, _) => install_with_writer!(std::io::stderr),
            (LogOutput::File, Some((path, rotation))) => {
                install_with_writer!(Self::file_appender(path, *rotation))
            }
            (LogOutput::File, None) => {
                let result = install_with_writer!(std::io::stdout);
                warn!("File output requested but no file path configured, fell back to stdout");
                result
            }
        }
    }
}
