//! Logging setup for the mirror node.
//!
//! The binary installs one global `tracing` subscriber at start-up. The
//! level comes from the configuration or the command line; `RUST_LOG`, when
//! set, takes precedence over both.
//!
//! # Log Formats
//!
//! - **Text** ([`LogFormat::Text`]): human-readable, optionally coloured
//! - **JSON** ([`LogFormat::Json`]): one object per line for log shippers
//!
//! ```no_run
//! use mirror_app::logging::{self, LogConfig};
//!
//! logging::init(&LogConfig::default().with_level("debug")).expect("logging");
//! ```

use std::fmt;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// HTTP client crates that are noisy at debug level.
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "h2=warn", "rustls=warn"];

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// ```text
    /// 2024-01-15T10:30:00Z  INFO mirror_downloader::downloader: Stream file processed stream_type=RECORD file=...
    /// ```
    #[default]
    Text,
    /// ```json
    /// {"timestamp":"2024-01-15T10:30:00Z","level":"INFO","fields":{"message":"Stream file processed"}}
    /// ```
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format: {}", other),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Text format only.
    pub ansi_colors: bool,
    pub with_source_location: bool,
    pub with_thread_ids: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
            ansi_colors: true,
            with_source_location: false,
            with_thread_ids: false,
        }
    }
}

impl LogConfig {
    /// Debug level with source locations.
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            with_source_location: true,
            with_thread_ids: true,
            ..Self::default()
        }
    }

    /// JSON output for production.
    pub fn json() -> Self {
        Self {
            format: LogFormat::Json,
            ansi_colors: false,
            with_source_location: true,
            with_thread_ids: true,
            ..Self::default()
        }
    }

    /// Sets the level by name; unknown names fall back to INFO.
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = parse_level(level).unwrap_or(Level::INFO);
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        if format == LogFormat::Json {
            self.ansi_colors = false;
        }
        self
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn default_filter(&self) -> anyhow::Result<EnvFilter> {
        let mut filter = EnvFilter::new(self.level.as_str());
        for directive in QUIET_TARGETS {
            filter = filter.add_directive(directive.parse()?);
        }
        Ok(filter)
    }
}

/// Parses a level name, accepting `warning` for `warn`.
pub fn parse_level(level: &str) -> Option<Level> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Installs the global subscriber. Call once, at start-up.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.default_filter()?,
    };

    match config.format {
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_ansi(config.ansi_colors)
                .with_target(true)
                .with_thread_ids(config.with_thread_ids)
                .with_file(config.with_source_location)
                .with_line_number(config.with_source_location);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_thread_ids(config.with_thread_ids)
                .with_file(config.with_source_location)
                .with_line_number(config.with_source_location)
                .with_current_span(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }
    Ok(())
}
