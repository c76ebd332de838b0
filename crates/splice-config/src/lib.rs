//! Configuration for the splice transformation engine.
//!
//! Settings come from built-in defaults overlaid with an optional TOML
//! file. Every key is optional; unknown keys are rejected so typos surface
//! as errors instead of being silently ignored.
//!
//! ```toml
//! log_filter = "splice=debug"
//! log_format = "json"
//! transformer_extension = "t"
//!
//! [watch]
//! extensions = ["ts", "t"]
//!
//! [install]
//! target_root = "build/out"
//! ```

mod defaults;
mod error;
mod logging;

use std::fs;
use std::io::ErrorKind;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_TRANSFORMER_EXTENSION, default_log_filter_string,
    default_log_format, default_transformer_extension,
};
pub use error::ConfigError;
pub use logging::{LogFormat, LogFormatParseError};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// `tracing` filter expression (for example `info` or `splice=debug`).
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format of the log subscriber.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// File suffix marking transformer-function sources.
    #[serde(default = "default_transformer_extension")]
    pub transformer_extension: String,
    /// Live-mode change filter.
    #[serde(default)]
    pub watch: WatchConfig,
    /// Installation of transformed items.
    #[serde(default)]
    pub install: InstallConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            transformer_extension: default_transformer_extension(),
            watch: WatchConfig::default(),
            install: InstallConfig::default(),
        }
    }
}

impl Config {
    /// Parses configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::InvalidValue`] for out-of-domain settings.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// see [`from_toml_str`](Self::from_toml_str).
    pub fn load_from_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|error| match error {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })
    }

    /// Loads configuration from a file, falling back to the defaults when
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// See [`load_from_path`](Self::load_from_path); a missing file is not
    /// an error.
    pub fn load_or_default(path: &Utf8Path) -> Result<Self, ConfigError> {
        match Self::load_from_path(path) {
            Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let suffix = self.transformer_extension.trim_start_matches('.');
        if suffix.is_empty() || suffix.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                key: "transformer_extension",
                message: format!("`{}` is not a file extension", self.transformer_extension),
            });
        }
        Ok(())
    }

    /// The transformer suffix without a leading dot.
    #[must_use]
    pub fn transformer_suffix(&self) -> &str {
        self.transformer_extension.trim_start_matches('.')
    }
}

/// Which changed files trigger re-tracking in live mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Extensions (without the dot) that trigger re-tracking. Empty means
    /// every extension the engine recognises.
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl WatchConfig {
    /// Decides whether a change to a file with `extension` is tracked.
    ///
    /// `recognised` tells whether the engine knows a language for the
    /// extension; it decides alone when no explicit list is configured.
    #[must_use]
    pub fn triggers(&self, extension: &str, recognised: bool) -> bool {
        if self.extensions.is_empty() {
            return recognised;
        }
        let wanted = extension.trim_start_matches('.');
        self.extensions
            .iter()
            .any(|ext| ext.trim_start_matches('.').eq_ignore_ascii_case(wanted))
    }
}

/// Where transformed items are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallConfig {
    /// Root directory under which item target paths are created.
    #[serde(default)]
    pub target_root: Option<Utf8PathBuf>,
}
