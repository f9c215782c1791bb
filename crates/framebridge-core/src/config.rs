//! Configuration management for framebridge
//!
//! Configuration is read from `framebridge.toml`. Every section is optional;
//! missing keys fall back to defaults.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "json"
//!
//! [logging.categories]
//! events = false
//!
//! [addons]
//! dir = "Interface/AddOns"
//! saved_variables_dir = "WTF/SavedVariables"
//! disabled = ["Broken"]
//!
//! [runtime]
//! tick_ms = 16
//! ticks = 120
//! ```

use crate::error::{Error, Result};
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// File name looked up in the user config directory.
pub const CONFIG_FILE_NAME: &str = "framebridge.toml";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-friendly output
    #[default]
    Pretty,
    /// JSON lines
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected pretty or json")),
        }
    }
}

/// Addon discovery and persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddonsConfig {
    /// Directory holding one subdirectory per addon
    pub dir: PathBuf,
    /// Directory for saved-variable files
    pub saved_variables_dir: PathBuf,
    /// Addons that are discovered but never loaded
    pub disabled: Vec<String>,
}

impl Default for AddonsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("AddOns"),
            saved_variables_dir: PathBuf::from("SavedVariables"),
            disabled: Vec::new(),
        }
    }
}

impl AddonsConfig {
    pub fn is_disabled(&self, addon: &str) -> bool {
        self.disabled
            .iter()
            .any(|name| name.eq_ignore_ascii_case(addon))
    }
}

/// Host loop settings used by the CLI runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Length of one update tick in milliseconds
    pub tick_ms: u64,
    /// Number of ticks `fb run` simulates between login and logout
    pub ticks: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            ticks: 60,
        }
    }
}

impl RuntimeConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LogConfig,
    pub addons: AddonsConfig,
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the user config directory is
    /// consulted and defaults are used when no file is found there.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("no config file found; using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Reject settings the runtime cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.runtime.tick_ms == 0 {
            return Err(Error::Config("runtime.tick_ms must be at least 1".to_string()));
        }
        if self.addons.dir.as_os_str().is_empty() {
            return Err(Error::Config("addons.dir must not be empty".to_string()));
        }
        Ok(())
    }

    /// Resolve relative addon paths against `base`.
    #[must_use]
    pub fn rooted_at(mut self, base: &Path) -> Self {
        if self.addons.dir.is_relative() {
            self.addons.dir = base.join(&self.addons.dir);
        }
        if self.addons.saved_variables_dir.is_relative() {
            self.addons.saved_variables_dir = base.join(&self.addons.saved_variables_dir);
        }
        self
    }
}

/// `<user config dir>/framebridge/framebridge.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("framebridge").join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn log_format_display() {
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.addons, AddonsConfig::default());
        assert_eq!(config.runtime, RuntimeConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = Config::from_toml_str(
            r#"
[logging]
format = "json"

[logging.categories]
events = false

[addons]
disabled = ["Broken"]

[runtime]
ticks = 5
"#,
        )
        .unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.logging.categories.events);
        assert!(config.logging.categories.lifecycle);
        assert!(config.addons.is_disabled("broken"));
        assert_eq!(config.addons.dir, PathBuf::from("AddOns"));
        assert_eq!(config.runtime.ticks, 5);
        assert_eq!(config.runtime.tick(), Duration::from_millis(16));
    }

    #[test]
    fn zero_tick_is_rejected() {
        let err = Config::from_toml_str("[runtime]\ntick_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("tick_ms"));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            Config::from_toml_str("[runtime\n"),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[addons]\ndir = \"/opt/addons\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.addons.dir, PathBuf::from("/opt/addons"));
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(Some(&dir.path().join("nope.toml"))),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn rooted_at_resolves_relative_dirs() {
        let config = Config::default().rooted_at(Path::new("/game"));
        assert_eq!(config.addons.dir, PathBuf::from("/game/AddOns"));
        assert_eq!(
            config.addons.saved_variables_dir,
            PathBuf::from("/game/SavedVariables")
        );
    }
}
