use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// The file that failed to load.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid TOML for [`Config`](crate::Config).
    #[error("invalid configuration{}: {source}", location(.path.as_deref()))]
    Parse {
        /// The offending file, when loaded from disk.
        path: Option<Utf8PathBuf>,
        /// Underlying TOML failure.
        #[source]
        source: toml::de::Error,
    },

    /// A setting holds a value outside its domain.
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue {
        /// Dotted key of the setting.
        key: &'static str,
        /// Description of the problem.
        message: String,
    },
}

fn location(path: Option<&camino::Utf8Path>) -> String {
    path.map(|p| format!(" in {p}")).unwrap_or_default()
}
