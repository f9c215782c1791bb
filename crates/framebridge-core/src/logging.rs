//! Structured logging for framebridge
//!
//! All bridge operations log through `tracing` under a small set of
//! category targets (see [`targets`]). Each category can be switched off
//! with a static flag in [`LogCategories`], which becomes an `=off`
//! directive in the subscriber's filter.
//!
//! # Usage
//!
//! ```ignore
//! use framebridge_core::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! ```
//!
//! # Correlation Fields
//!
//! Use these field names consistently:
//! - `handle`: object handle (hex)
//! - `object`: debug name of the object (`name` or `Kind<handle>`)
//! - `kind`: widget kind
//! - `event`: event name
//! - `slot`: callback slot name
//! - `addon`: addon name
//! - `chunk`: script chunk name

pub use crate::config::LogFormat;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Log targets, one per category.
pub mod targets {
    /// Object creation, release, handle and reference pinning.
    pub const LIFECYCLE: &str = "framebridge::lifecycle";
    /// Event trigger, register and unregister.
    pub const EVENTS: &str = "framebridge::events";
    /// Callback set, hook, remove and invocation.
    pub const CALLBACKS: &str = "framebridge::callbacks";
    /// Method resolution and class table construction.
    pub const DISPATCH: &str = "framebridge::dispatch";
    /// Output produced by scripts (`print`) and script load failures.
    pub const SCRIPT: &str = "framebridge::script";
    /// Addon discovery, loading and saved variables.
    pub const ADDONS: &str = "framebridge::addons";
}

/// Global flag to track if logging has been initialized
static LOGGING_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Per-category verbosity switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogCategories {
    pub lifecycle: bool,
    pub events: bool,
    pub callbacks: bool,
    pub dispatch: bool,
    pub script: bool,
    pub addons: bool,
}

impl Default for LogCategories {
    fn default() -> Self {
        Self {
            lifecycle: true,
            events: true,
            callbacks: true,
            dispatch: false,
            script: true,
            addons: true,
        }
    }
}

impl LogCategories {
    /// Filter directives silencing every disabled category.
    pub fn directives(&self) -> Vec<String> {
        [
            (self.lifecycle, targets::LIFECYCLE),
            (self.events, targets::EVENTS),
            (self.callbacks, targets::CALLBACKS),
            (self.dispatch, targets::DISPATCH),
            (self.script, targets::SCRIPT),
            (self.addons, targets::ADDONS),
        ]
        .into_iter()
        .filter(|(enabled, _)| !enabled)
        .map(|(_, target)| format!("{target}=off"))
        .collect()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter (trace, debug, info, warn, error)
    /// Can be overridden by RUST_LOG environment variable
    pub level: String,

    /// Output format (pretty or json)
    pub format: LogFormat,

    /// Optional path to log file
    pub file: Option<PathBuf>,

    /// Per-category switches
    pub categories: LogCategories,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
            categories: LogCategories::default(),
        }
    }
}

impl LogConfig {
    /// Build the env filter: `RUST_LOG` wins, else level plus category directives.
    pub fn env_filter(&self) -> Result<EnvFilter, LogError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        self.static_filter()
    }

    fn static_filter(&self) -> Result<EnvFilter, LogError> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|_| LogError::InvalidLevel(self.level.clone()))?;
        for directive in self.categories.directives() {
            let directive = directive
                .parse()
                .map_err(|_| LogError::InvalidLevel(directive.clone()))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }
}

/// Error type for logging initialization
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,

    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    #[error("failed to create log file: {0}")]
    FileCreate(#[from] io::Error),

    #[error("failed to set global subscriber: {0}")]
    SetSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize the global logging subscriber
///
/// Subsequent calls return `Err(LogError::AlreadyInitialized)`.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    let env_filter = config.env_filter()?;

    let file_writer = if let Some(path) = &config.file {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?,
        )
    } else {
        None
    };

    match config.format {
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(true),
            );
            let file_layer = file_writer.map(|file| {
                fmt::layer()
                    .with_writer(file)
                    .with_target(true)
                    .with_ansi(false)
            });
            tracing::subscriber::set_global_default(subscriber.with(file_layer))?;
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .json()
                    .with_timer(SystemTime)
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .flatten_event(true),
            );
            let file_layer = file_writer.map(|file| {
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_timer(SystemTime)
                    .with_target(true)
                    .flatten_event(true)
            });
            tracing::subscriber::set_global_default(subscriber.with(file_layer))?;
        }
    }

    let _ = LOGGING_INITIALIZED.set(true);

    tracing::info!(
        log_level = %config.level,
        log_format = %config.format,
        log_file = ?config.file,
        disabled = ?config.categories.directives(),
        "Logging initialized"
    );

    Ok(())
}

/// Check if logging has been initialized
pub fn is_logging_initialized() -> bool {
    LOGGING_INITIALIZED.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// Captures output to a shared buffer
    #[derive(Clone)]
    struct MockLogWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl MockLogWriter {
        fn new() -> Self {
            Self {
                buffer: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn contents(&self) -> String {
            String::from_utf8(self.buffer.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for MockLogWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for MockLogWriter {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.file.is_none());
        assert!(config.categories.events);
        assert!(!config.categories.dispatch);
    }

    #[test]
    fn directives_list_only_disabled_categories() {
        let categories = LogCategories {
            events: false,
            callbacks: false,
            dispatch: true,
            ..LogCategories::default()
        };
        assert_eq!(
            categories.directives(),
            vec![
                "framebridge::events=off".to_string(),
                "framebridge::callbacks=off".to_string(),
            ]
        );
    }

    #[test]
    fn invalid_level_is_rejected() {
        let config = LogConfig {
            level: "loud[".to_string(),
            ..LogConfig::default()
        };
        assert!(matches!(
            config.static_filter(),
            Err(LogError::InvalidLevel(_))
        ));
    }

    #[test]
    fn disabled_category_is_filtered_out() {
        let writer = MockLogWriter::new();
        let config = LogConfig {
            categories: LogCategories {
                events: false,
                ..LogCategories::default()
            },
            ..LogConfig::default()
        };
        let subscriber = tracing_subscriber::registry()
            .with(config.static_filter().unwrap())
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(writer.clone()),
            );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: targets::EVENTS, event = "PLAYER_LOGIN", "event fired");
            tracing::info!(target: targets::LIFECYCLE, handle = "0x1", "object created");
        });

        let output = writer.contents();
        assert!(!output.contains("PLAYER_LOGIN"));
        let line = output.lines().find(|line| !line.trim().is_empty()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(
            parsed.get("target").and_then(|v| v.as_str()),
            Some(targets::LIFECYCLE)
        );
    }

    #[test]
    fn log_config_toml_roundtrip() {
        let config = LogConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
            file: Some(PathBuf::from("/tmp/framebridge.log")),
            categories: LogCategories {
                script: false,
                ..LogCategories::default()
            },
        };
        let text = toml::to_string(&config).unwrap();
        let parsed: LogConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.level, config.level);
        assert_eq!(parsed.format, config.format);
        assert_eq!(parsed.file, config.file);
        assert_eq!(parsed.categories, config.categories);
    }
}
